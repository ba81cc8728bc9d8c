//! Seismic intensity and tsunami classifications used by quake reports.

use serde::{Deserialize, Serialize};

/// JMA seismic intensity class, decoded from the feed's numeric scale code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeismicIntensity {
    One,
    Two,
    Three,
    Four,
    FiveLower,
    FiveUpper,
    SixLower,
    SixUpper,
    Seven,
    Unknown,
}

impl SeismicIntensity {
    /// Decode a feed scale code (10, 20, ..., 70). Anything else is `Unknown`.
    pub fn from_scale(scale: i32) -> Self {
        match scale {
            10 => Self::One,
            20 => Self::Two,
            30 => Self::Three,
            40 => Self::Four,
            45 => Self::FiveLower,
            50 => Self::FiveUpper,
            55 => Self::SixLower,
            60 => Self::SixUpper,
            70 => Self::Seven,
            _ => Self::Unknown,
        }
    }

    /// Scale code for this class, `None` for `Unknown`.
    pub fn scale(&self) -> Option<i32> {
        match self {
            Self::One => Some(10),
            Self::Two => Some(20),
            Self::Three => Some(30),
            Self::Four => Some(40),
            Self::FiveLower => Some(45),
            Self::FiveUpper => Some(50),
            Self::SixLower => Some(55),
            Self::SixUpper => Some(60),
            Self::Seven => Some(70),
            Self::Unknown => None,
        }
    }

    /// Japanese label as shown on the sidebar and spoken in announcements.
    pub fn label(&self) -> &'static str {
        match self {
            Self::One => "1",
            Self::Two => "2",
            Self::Three => "3",
            Self::Four => "4",
            Self::FiveLower => "5弱",
            Self::FiveUpper => "5強",
            Self::SixLower => "6弱",
            Self::SixUpper => "6強",
            Self::Seven => "7",
            Self::Unknown => "情報なし",
        }
    }
}

/// Domestic tsunami status carried by a quake report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TsunamiStatus {
    #[default]
    None,
    Unknown,
    Checking,
    NonEffective,
    Watch,
    Warning,
    MajorWarning,
    /// A value the feed sent that this build does not recognise.
    Other(String),
}

impl From<String> for TsunamiStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "None" => Self::None,
            "Unknown" => Self::Unknown,
            "Checking" => Self::Checking,
            "NonEffective" => Self::NonEffective,
            "Watch" => Self::Watch,
            "Warning" => Self::Warning,
            "MajorWarning" => Self::MajorWarning,
            _ => Self::Other(raw),
        }
    }
}

impl From<TsunamiStatus> for String {
    fn from(status: TsunamiStatus) -> Self {
        match status {
            TsunamiStatus::None => "None".to_string(),
            TsunamiStatus::Unknown => "Unknown".to_string(),
            TsunamiStatus::Checking => "Checking".to_string(),
            TsunamiStatus::NonEffective => "NonEffective".to_string(),
            TsunamiStatus::Watch => "Watch".to_string(),
            TsunamiStatus::Warning => "Warning".to_string(),
            TsunamiStatus::MajorWarning => "MajorWarning".to_string(),
            TsunamiStatus::Other(raw) => raw,
        }
    }
}

impl TsunamiStatus {
    /// Collapse the status into the level the sidebar colours by.
    pub fn level(&self) -> TsunamiLevel {
        match self {
            Self::Watch => TsunamiLevel::Watch,
            Self::Warning => TsunamiLevel::Warning,
            Self::MajorWarning => TsunamiLevel::MajorWarning,
            _ => TsunamiLevel::None,
        }
    }

    /// Sentence appended to spoken announcements. Empty when nothing definite
    /// can be said.
    pub fn announcement(&self) -> &'static str {
        match self {
            Self::MajorWarning => "大津波警報が発表されています。",
            Self::Warning => "津波警報が発表されています。",
            Self::Watch => "津波注意報が発表されています。",
            Self::None => "津波の心配はありません。",
            _ => "",
        }
    }
}

/// Display level for the tsunami banner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TsunamiLevel {
    #[default]
    None,
    Watch,
    Warning,
    MajorWarning,
}

impl TsunamiLevel {
    /// Banner text, `None` when no banner is shown.
    pub fn banner(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Watch => Some("津波注意報"),
            Self::Warning => Some("津波警報"),
            Self::MajorWarning => Some("大津波警報"),
        }
    }
}
