use crate::error::CodesError;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Game {
    Bl1,
    Bl2,
    Blps,
    Bl3,
    Ttw,
    Bl4,
}

impl Game {
    pub const ALL: [Game; 6] = [
        Game::Bl1,
        Game::Bl2,
        Game::Blps,
        Game::Bl3,
        Game::Ttw,
        Game::Bl4,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Game::Bl1 => "bl1",
            Game::Bl2 => "bl2",
            Game::Blps => "blps",
            Game::Bl3 => "bl3",
            Game::Ttw => "ttw",
            Game::Bl4 => "bl4",
        }
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Game {
    type Err = CodesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bl1" => Ok(Game::Bl1),
            "bl2" => Ok(Game::Bl2),
            "blps" | "tps" => Ok(Game::Blps),
            "bl3" => Ok(Game::Bl3),
            "ttw" | "wonderlands" => Ok(Game::Ttw),
            "bl4" => Ok(Game::Bl4),
            _ => Err(CodesError::UnknownGame(s.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize, PartialEq, Eq, Hash)]
pub enum Platform {
    #[serde(rename = "steam")]
    Steam,
    #[serde(rename = "epic")]
    Epic,
    #[serde(rename = "psn")]
    Playstation,
    #[serde(rename = "xboxlive")]
    Xbox,
    #[serde(rename = "stadia")]
    Stadia,
    #[serde(rename = "nintendo")]
    Nintendo,
}

impl Platform {
    pub const ALL: [Platform; 6] = [
        Platform::Steam,
        Platform::Epic,
        Platform::Playstation,
        Platform::Xbox,
        Platform::Stadia,
        Platform::Nintendo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Steam => "steam",
            Platform::Epic => "epic",
            Platform::Playstation => "psn",
            Platform::Xbox => "xboxlive",
            Platform::Stadia => "stadia",
            Platform::Nintendo => "nintendo",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = CodesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "steam" | "pc" => Ok(Platform::Steam),
            "epic" => Ok(Platform::Epic),
            "psn" | "ps" | "playstation" => Ok(Platform::Playstation),
            "xboxlive" | "xbox" => Ok(Platform::Xbox),
            "stadia" => Ok(Platform::Stadia),
            "nintendo" | "switch" => Ok(Platform::Nintendo),
            _ => Err(CodesError::UnknownPlatform(s.to_string())),
        }
    }
}

/// A (game, platform) pair. Every collection belongs to exactly one scope.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize, PartialEq, Eq, Hash)]
pub struct Scope {
    pub game: Game,
    pub platform: Platform,
}

impl Scope {
    pub fn new(game: Game, platform: Platform) -> Self {
        Self { game, platform }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.game, self.platform)
    }
}

/// One redeemable code. `code` is the natural key inside its scope.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct ShiftCode {
    pub code: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub expires: String,
    #[serde(default)]
    redeemed: bool,
}

impl ShiftCode {
    pub fn new(
        code: impl Into<String>,
        description: impl Into<String>,
        expires: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
            expires: expires.into(),
            redeemed: false,
        }
    }

    /// Rebuild a record as it was persisted, flag included.
    pub fn restored(
        code: impl Into<String>,
        description: impl Into<String>,
        expires: impl Into<String>,
        redeemed: bool,
    ) -> Self {
        Self {
            redeemed,
            ..Self::new(code, description, expires)
        }
    }

    pub fn redeemed(&self) -> bool {
        self.redeemed
    }

    /// One-way: there is deliberately no way to clear the flag again.
    pub fn mark_redeemed(&mut self) {
        self.redeemed = true;
    }

    /// Number of golden keys granted, if the description reads like
    /// `"3 Golden Keys"`.
    pub fn golden_keys(&self) -> Option<u32> {
        let desc = self.description.trim_start();
        let digits_end = desc
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map(|(i, _)| i)
            .unwrap_or(desc.len());
        if digits_end == 0 {
            return None;
        }
        let (count, rest) = desc.split_at(digits_end);
        if !rest.to_ascii_lowercase().contains("gold") {
            return None;
        }
        count.parse().ok()
    }

    /// Description on a single line, as used in status messages.
    pub fn one_line_description(&self) -> String {
        self.description.replace('\n', " / ")
    }
}

/// Which codes a listing or a redemption run looks at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CodeKind {
    #[default]
    All,
    Golden,
    NonGolden,
}

impl CodeKind {
    pub fn matches(&self, code: &ShiftCode) -> bool {
        match self {
            CodeKind::All => true,
            CodeKind::Golden => code.golden_keys().is_some(),
            // Anything mentioning gold is left out, not only key grants.
            CodeKind::NonGolden => !code.description.to_ascii_lowercase().contains("gold"),
        }
    }
}

impl FromStr for CodeKind {
    type Err = CodesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(CodeKind::All),
            "golden" | "keys" => Ok(CodeKind::Golden),
            "non-golden" | "nongolden" | "other" => Ok(CodeKind::NonGolden),
            other => Err(CodesError::UnknownKind(other.to_string())),
        }
    }
}
