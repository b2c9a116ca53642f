use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Mood {
    pub name: &'static str,
    pub emoji: &'static str,
}

pub const MOODS: &[Mood] = &[
    Mood { name: "Joy", emoji: "😄" },
    Mood { name: "Sadness", emoji: "😢" },
    Mood { name: "Fear", emoji: "😨" },
    Mood { name: "Disgust", emoji: "🤢" },
    Mood { name: "Anger", emoji: "😠" },
];

pub const THEMES: &[&str] = &[
    "Strength", "Gratitude", "Forgiveness", "Love", "Hope", "Peace", "Courage", "Wisdom",
    "Joy", "Patience", "Humility", "Compassion", "Faith", "Mindfulness", "Purpose",
    "Healing", "Unity", "Growth", "Generosity", "Resilience",
];

pub const RELIGIONS: &[&str] = &["Christianity", "Islam", "Judaism", "Hinduism", "Buddhism", "Other"];

pub fn mood_by_name(name: &str) -> Option<&'static Mood> {
    MOODS.iter().find(|m| m.name.eq_ignore_ascii_case(name.trim()))
}

pub fn is_religion(name: &str) -> bool {
    RELIGIONS.iter().any(|r| r.eq_ignore_ascii_case(name.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(mood_by_name(" joy").map(|m| m.emoji), Some("😄"));
        assert!(mood_by_name("Boredom").is_none());
        assert!(is_religion("buddhism"));
        assert_eq!(THEMES.len(), 20);
    }
}
