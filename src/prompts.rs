pub const NO_PREVIOUS_PHRASES: &str = "No previous phrases";

const REFLECTION_TEMPLATE: &str = r#"
You are a supportive friend creating an inspirational message.

Task: Generate a short, positive, and encouraging thought that:
- Acknowledges the user's current emotions (based on the selected moods)
- Offers gentle comfort
- Provides hope and motivation
- Is easy to understand
- Fits in one to three sentences (max 100 words)
- Avoids very complex language

Guidelines:
1. Create a reflection that is COMPLETELY DIFFERENT from these key phrases:
{previous_key_phrases}

2. Mood Themes: {themes}

Requirements:
- Concise (under 80 words)
- Deeply personal
- Use simple, understandable language
- Unique emotional perspective

Guidelines 2:
- Keep it simple and hopeful
- Use warm, encouraging language
- Make it relatable and uplifting
"#;

pub const THOUGHT_OF_THE_DAY_PROMPT: &str = r#"
You are an expert in creating inspirational and motivational content. Your task is to generate a "Thought of the Day" that is concise, impactful, and resonates deeply with users.

Guidelines:
- The thought should be less than 100 words.
- Ensure the content is meaningful and can inspire or uplift the user.
- Avoid using special characters like "\" to maintain format integrity.
- Do not include any sensitive or controversial topics.

Output:
- Return a single string containing the "Thought of the Day".
"#;

const SPIRITUAL_PROMPT: &str = r#"
You are an expert in creating personalized spiritual content for users.
Generate spiritual content for a {religion} of the {denomination} denomination focusing on {themes}.
Write a daily devotional under 150 words, a prayer guide under 150 words, an inspirational quote under 100 words and a short religious insight about this day, week or month for that religion.

Avoid:
- Generating content that is too generic or not specific to the user's inputs.
- Mentioning sensitive information or controversial topics.
- Repeating the same structure for each response.
- Special characters like "\" that would break the JSON.

Output:
Return only a JSON object with the keys daily_devotional, prayer_guide, inspirational_quote and religious_insight.
"#;

/// Builds the reflection prompt for the selected moods, steering away from
/// the given recent key phrases. Returns `None` without a mood: generation
/// must not run then.
pub fn build_reflection_prompt<T: AsRef<str>, P: AsRef<str>>(tags: &[T], key_phrases: &[P]) -> Option<String> {
    if tags.is_empty() {
        return None;
    }
    let themes = join(tags, ", ");
    let previous = if key_phrases.is_empty() {
        NO_PREVIOUS_PHRASES.to_string()
    } else {
        join(key_phrases, "\n")
    };
    Some(
        REFLECTION_TEMPLATE
            .replace("{previous_key_phrases}", &previous)
            .replace("{themes}", &themes),
    )
}

pub fn build_themed_thought_prompt<S: AsRef<str>>(themes: &[S]) -> String {
    if themes.is_empty() {
        return THOUGHT_OF_THE_DAY_PROMPT.to_string();
    }
    format!(
        "{THOUGHT_OF_THE_DAY_PROMPT}\nGenerate a 'Thought of the Day' focusing on the themes: {}.",
        join(themes, ", ")
    )
}

pub fn build_spiritual_prompt<S: AsRef<str>>(religion: &str, denomination: &str, themes: &[S]) -> String {
    let denomination = match denomination.trim() {
        "" => "general",
        d => d,
    };
    let themes = if themes.is_empty() { "everyday faith".to_string() } else { join(themes, ", ") };
    SPIRITUAL_PROMPT
        .replace("{religion}", religion.trim())
        .replace("{denomination}", denomination)
        .replace("{themes}", &themes)
}

fn join<S: AsRef<str>>(items: &[S], sep: &str) -> String {
    items.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(sep)
}
