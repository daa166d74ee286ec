use crate::core::palette::ClassPalette;

/// Class id returned for any color that no palette entry claims.
///
/// Masks routinely contain colors outside the palette (VOC paints object
/// boundaries in a "void" color); those pixels become background.
pub const UNMAPPED_CLASS: u8 = 0;

const TABLE_SIZE: usize = 1 << 24;

/// Pack an RGB triple into the 24-bit table key `r*65536 + g*256 + b`.
#[inline]
pub fn pack_rgb(r: u8, g: u8, b: u8) -> usize {
    ((r as usize) << 16) | ((g as usize) << 8) | b as usize
}

/// Dense color → class id table covering every 24-bit RGB value.
///
/// Built once from a palette and never mutated afterwards; share it by
/// reference across decode workers.
pub struct ColorLookupTable {
    table: Box<[u8]>,
}

impl ColorLookupTable {
    /// Fill the table in palette order. A color listed twice maps to the later index.
    pub fn build(palette: &ClassPalette) -> Self {
        let mut table = vec![UNMAPPED_CLASS; TABLE_SIZE].into_boxed_slice();
        for (class_id, entry) in palette.entries().iter().enumerate() {
            let [r, g, b] = entry.color;
            table[pack_rgb(r, g, b)] = class_id as u8;
        }
        Self { table }
    }

    /// Class id for an exact color, or [`UNMAPPED_CLASS`].
    #[inline]
    pub fn lookup(&self, r: u8, g: u8, b: u8) -> u8 {
        self.table[pack_rgb(r, g, b)]
    }
}

impl std::fmt::Debug for ColorLookupTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mapped = self.table.iter().filter(|&&c| c != UNMAPPED_CLASS).count();
        f.debug_struct("ColorLookupTable")
            .field("mapped_colors", &mapped)
            .finish()
    }
}
