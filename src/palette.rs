pub const DEFAULT_PALETTE: &str = "japanese";

const RAMPS: &[(&str, &str)] = &[
    (
        "japanese",
        " ・.:-=+*c1tjo7z3sz？！ァィゥェォカキクケコサシスセソタチツテトナニヌネノハヒフヘホマミムメモヤユヨラリルレロワヲン月火水木金土日",
    ),
    (
        "ascii",
        " .'`^,:;Il!i><~+_-?][}{1)(|/tfjrxnuvczXYUJCLQ0OZmwqpdbkhao*#MW&8%B@$",
    ),
    ("binary", " 010101011100011"),
    ("blocks", " ░▒▓█"),
    ("runes", " ᚛᚜ᚐᚑᚒᚓᚔᚕᚖᚗᚘᚙᚚᚠᚡᚢᚣᚤᚥᚦᚧᚨᚩᚪᚫᚬᚭᚮᚯ"),
    ("math", " .-={}+<>&*$#@∑∫≈∞"),
    ("braille", " ⠀⠄⠆⠖⠶⡶⣩⣪⣫⣾⣿"),
    ("dots", " 　.·,:;°^~•*oO0@●◎⦿"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    name: &'static str,
    glyphs: Vec<char>,
}

impl Palette {
    fn from_ramp(name: &'static str, ramp: &str) -> Self {
        let glyphs: Vec<char> = ramp.chars().collect();
        debug_assert!(glyphs.len() >= 2, "palette {name} needs at least two glyphs");
        Self { name, glyphs }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    pub fn glyphs(&self) -> &[char] {
        &self.glyphs
    }

    /// Glyph at `index`, clamped to the last glyph.
    pub fn glyph(&self, index: usize) -> char {
        self.glyphs[index.min(self.glyphs.len() - 1)]
    }

    pub fn brightest(&self) -> char {
        self.glyphs[self.glyphs.len() - 1]
    }
}

pub struct PaletteRegistry {
    palettes: Vec<Palette>,
}

impl Default for PaletteRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PaletteRegistry {
    pub fn new() -> Self {
        Self {
            palettes: RAMPS
                .iter()
                .map(|(name, ramp)| Palette::from_ramp(name, ramp))
                .collect(),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.palettes.iter().map(|p| p.name)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    /// Looks up a palette by key. Unknown keys resolve to the default palette.
    pub fn get(&self, key: &str) -> &Palette {
        self.find(key).unwrap_or_else(|| self.default_palette())
    }

    pub fn default_palette(&self) -> &Palette {
        // The default key is part of the built-in table.
        self.find(DEFAULT_PALETTE).unwrap_or(&self.palettes[0])
    }

    /// Key of the palette `step` positions away from `key`, wrapping around.
    pub fn cycle(&self, key: &str, step: isize) -> &'static str {
        let n = self.palettes.len() as isize;
        let cur = self
            .palettes
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(key.trim()))
            .unwrap_or(0) as isize;
        let next = (cur + step).rem_euclid(n) as usize;
        self.palettes[next].name
    }

    fn find(&self, key: &str) -> Option<&Palette> {
        let key = key.trim();
        self.palettes
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(key))
    }
}
