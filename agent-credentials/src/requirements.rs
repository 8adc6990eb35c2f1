//! Credential hints read from a creation prompt before any code exists.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use agent_catalog::CredentialRecord;
use agent_primitives::CredentialName;
use regex::Regex;

static EXPLICIT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z][A-Z0-9_]*_(?:API_KEY|KEY|TOKEN|SECRET)\b").expect("valid regex")
});

const MIN_MATCH_WORD_LEN: usize = 4;

const IGNORED_WORDS: &[&str] = &[
    "about", "from", "into", "that", "this", "tool", "using", "with", "your", "data", "free",
    "public", "service",
];

/// Credential names a prompt probably needs.
///
/// Explicit upper-case names ending in `_KEY`, `_TOKEN`, `_SECRET` or
/// `_API_KEY` come first, in prompt order. Registered records follow when
/// the prompt mentions their name or a significant word of their
/// description.
#[must_use]
pub fn credential_hints(prompt: &str, records: &[CredentialRecord]) -> Vec<CredentialName> {
    let mut hints: Vec<CredentialName> = Vec::new();
    for found in EXPLICIT_NAME.find_iter(prompt) {
        if let Ok(name) = CredentialName::new(found.as_str()) {
            if !hints.contains(&name) {
                hints.push(name);
            }
        }
    }

    let prompt_words = words(prompt);
    let lowered = prompt.to_ascii_lowercase();
    for record in records {
        if hints.contains(record.name()) {
            continue;
        }
        let named = lowered.contains(&record.name().as_str().to_ascii_lowercase());
        let described = words(record.description())
            .iter()
            .any(|word| prompt_words.contains(word));
        if named || described {
            hints.push(record.name().clone());
        }
    }
    hints
}

fn words(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| word.len() >= MIN_MATCH_WORD_LEN)
        .map(str::to_ascii_lowercase)
        .filter(|word| !IGNORED_WORDS.contains(&word.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use agent_catalog::CredentialSource;

    use super::*;

    fn record(name: &str, description: &str) -> CredentialRecord {
        CredentialRecord::new(
            CredentialName::new(name).unwrap(),
            "value",
            description,
            CredentialSource::Admin,
        )
    }

    fn names(hints: &[CredentialName]) -> Vec<&str> {
        hints.iter().map(CredentialName::as_str).collect()
    }

    #[test]
    fn explicit_names_are_collected_once() {
        let hints = credential_hints(
            "Call GITHUB_TOKEN then MAPS_API_KEY, and GITHUB_TOKEN again; ignore SOME_VALUE",
            &[],
        );
        assert_eq!(names(&hints), ["GITHUB_TOKEN", "MAPS_API_KEY"]);
    }

    #[test]
    fn records_match_on_description_words_or_name() {
        let records = [
            record("WEATHER_KEY", "OpenWeatherMap weather api"),
            record("STRIPE_SECRET", "payments"),
            record("NEWS_KEY", "news headlines"),
        ];
        let hints = credential_hints("Show tomorrow's weather in Lyon", &records);
        assert_eq!(names(&hints), ["WEATHER_KEY"]);

        let hints = credential_hints("use news_key to list stories", &records);
        assert_eq!(names(&hints), ["NEWS_KEY"]);
    }

    #[test]
    fn common_words_do_not_match() {
        let records = [record("ANY_KEY", "a public data service")];
        assert!(credential_hints("get public data from a service", &records).is_empty());
    }
}
