/// A `mask`/`shift` pair addressing a sub-field of a packed flag word.
///
/// `mask` is expressed in place (already shifted), matching how the packed
/// layouts document their fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
    pub mask: u16,
    pub shift: u32,
}

impl BitField {
    pub const fn new(mask: u16, shift: u32) -> Self {
        Self { mask, shift }
    }

    /// Width-limited field starting at bit `shift`.
    pub const fn span(bits: u32, shift: u32) -> Self {
        Self {
            mask: (((1u32 << bits) - 1) << shift) as u16,
            shift,
        }
    }

    /// Largest value the field can hold.
    pub const fn max_value(&self) -> u16 {
        self.mask >> self.shift
    }

    #[inline(always)]
    pub const fn get(&self, word: u16) -> u16 {
        (word & self.mask) >> self.shift
    }

    /// Returns `word` with the field replaced by `value`; excess bits are dropped.
    #[inline(always)]
    pub const fn set(&self, word: u16, value: u16) -> u16 {
        (word & !self.mask) | ((value << self.shift) & self.mask)
    }

    /// Like [`set`](Self::set) but clamps `value` to the field instead of
    /// truncating it.
    #[inline(always)]
    pub const fn set_saturating(&self, word: u16, value: u16) -> u16 {
        let max = self.max_value();
        let value = if value > max { max } else { value };
        self.set(word, value)
    }
}
