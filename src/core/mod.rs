pub mod example;
pub mod lookup;
pub mod mask;
pub mod palette;
pub mod record;
pub mod tfrecord;
