//! Effect algorithm identifiers.

/// Display names indexed by effect type id.
const EFFECT_TYPE_NAMES: [&str; 0x4A] = [
    "Acoustic Multi",
    "8 Band Parallel Delay",
    "8 Band Series Delay",
    "4 Band 2 Tap Mod. Delay",
    "2 Band 4 Tap Mod. Delay",
    "8 Multi Tap Mod. Delay",
    "2 Band Long + 4 Short Mod. Delay",
    "Short + Medium + Long Mod. Delay",
    "Amp Simulator",
    "Reverb",
    "Early Reflections",
    "Gate Reverb",
    "Reverse Gate",
    "Mono Delay",
    "Stereo Delay",
    "Mod. Delay",
    "Delay LCR",
    "Echo",
    "Chorus",
    "Flange",
    "Symphonic",
    "Phaser",
    "AutoPan",
    "Tremolo",
    "HQ Pitch",
    "Dual Pitch",
    "Rotary",
    "Ring Mod.",
    "Mod. Filter",
    "Digital Distortion",
    "Dynamic Filter",
    "Dynamic Flange",
    "Dynamic Phaser",
    "Reverb + Chorus",
    "Reverb -> Chorus",
    "Reverb + Flange",
    "Reverb -> Flange",
    "Reverb + Symphonic",
    "Reverb -> Symphonic",
    "Reverb -> Pan",
    "Delay + Early Ref.",
    "Delay -> Early Ref.",
    "Delay + Reverb",
    "Delay -> Reverb",
    "Distortion -> Delay",
    "Multi Filter",
    "M. Band Dynamic Processor",
    "Distortion",
    "Vintage Flange",
    "Mono Vintage Phaser",
    "Stereo Vintage Phaser",
    "3 Band Parametric EQ",
    "Spring Reverb",
    "Tape Echo",
    "Compressor",
    "Amp Multi (Chorus)",
    "Amp Multi (Flange)",
    "Amp Multi (Tremolo)",
    "Amp Multi (Phaser)",
    "Amp Multi (Rotary)",
    "Amp Multi (Pan)",
    "Amp Multi (Pitch)",
    "Amp Multi (Filter)",
    "Amp Multi (Distortion)",
    "Bass Preamp",
    "Bass Multi (Chorus)",
    "Bass Multi (Flange)",
    "Bass Multi (Tremolo)",
    "Bass Multi (Phaser)",
    "Bass Multi (Rotary)",
    "Bass Multi (Pan)",
    "Bass Multi (Pitch)",
    "Bass Multi (Filter)",
    "Bass Multi (Distortion)",
];

/// A known effect algorithm (0x00..=0x49).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectType(u8);

impl EffectType {
    /// Highest valid id.
    pub const LAST_ID: u8 = 0x49;

    /// Look up an id, `None` for anything the device does not define.
    pub fn from_id(id: u8) -> Option<Self> {
        (id <= Self::LAST_ID).then_some(Self(id))
    }

    /// Raw id as stored in the patch.
    pub fn id(self) -> u8 {
        self.0
    }

    /// Human-readable algorithm name.
    pub fn name(self) -> &'static str {
        EFFECT_TYPE_NAMES[self.0 as usize]
    }

    /// Every defined effect type in id order.
    pub fn all() -> impl Iterator<Item = EffectType> {
        (0..=Self::LAST_ID).map(EffectType)
    }
}

impl std::fmt::Display for EffectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
