//! Rom filename parsing.
//!
//! Library filenames follow the No-Intro / GoodTools convention of
//! parenthesised and bracketed tags after the title, e.g.
//! `Super Mario 64 (USA) (Rev 1) [!].z64`. Region, language and
//! revision tags are lifted into their own fields; everything else
//! stays in `tags`.

use once_cell::sync::Lazy;
use regex::Regex;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(([^)]+)\)|\[([^\]]+)\]").unwrap());

// Handles compound extensions such as `tar.gz` or `p8.png`.
static EXTENSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.(([a-z]+\.)*\w+)$").unwrap());

static REVISION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^rev[\s-](.+)$").unwrap());
static REGION_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^reg[\s-](.+)$").unwrap());

/// GoodTools single/double letter region codes.
const REGION_CODES: &[(&str, &str)] = &[
    ("a", "Australia"),
    ("as", "Asia"),
    ("b", "Brazil"),
    ("c", "Canada"),
    ("ch", "China"),
    ("e", "Europe"),
    ("f", "France"),
    ("fn", "Finland"),
    ("g", "Germany"),
    ("gr", "Greece"),
    ("h", "Holland"),
    ("hk", "Hong Kong"),
    ("i", "Italy"),
    ("j", "Japan"),
    ("k", "Korea"),
    ("nl", "Netherlands"),
    ("no", "Norway"),
    ("pd", "Public Domain"),
    ("r", "Russia"),
    ("s", "Spain"),
    ("sw", "Sweden"),
    ("t", "Taiwan"),
    ("u", "USA"),
    ("uk", "United Kingdom"),
    ("unk", "Unknown"),
    ("unl", "Unlicensed"),
    ("w", "World"),
];

const REGION_NAMES: &[&str] = &[
    "australia",
    "asia",
    "brazil",
    "canada",
    "china",
    "europe",
    "finland",
    "france",
    "germany",
    "greece",
    "holland",
    "hong kong",
    "italy",
    "japan",
    "korea",
    "netherlands",
    "norway",
    "russia",
    "spain",
    "sweden",
    "taiwan",
    "unknown",
    "unlicensed",
    "usa",
    "united kingdom",
    "world",
];

/// ISO-639-1 codes as they appear in No-Intro language tags.
const LANGUAGE_CODES: &[(&str, &str)] = &[
    ("ar", "Arabic"),
    ("da", "Danish"),
    ("de", "German"),
    ("en", "English"),
    ("es", "Spanish"),
    ("fi", "Finnish"),
    ("fr", "French"),
    ("it", "Italian"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("nl", "Dutch"),
    ("no", "Norwegian"),
    ("pl", "Polish"),
    ("pt", "Portuguese"),
    ("ru", "Russian"),
    ("sv", "Swedish"),
    ("zh", "Chinese"),
];

const LANGUAGE_NAMES: &[&str] = &[
    "arabic",
    "chinese",
    "danish",
    "dutch",
    "english",
    "finnish",
    "french",
    "german",
    "italian",
    "japanese",
    "korean",
    "norwegian",
    "polish",
    "portuguese",
    "russian",
    "spanish",
    "swedish",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFilename {
    pub no_ext: String,
    pub extension: String,
    pub no_tags: String,
    pub regions: Vec<String>,
    pub languages: Vec<String>,
    pub revision: String,
    /// Tags that are not a region, language or revision, e.g. `b` or `!`.
    pub tags: Vec<String>,
}

pub fn parse(file_name: &str) -> ParsedFilename {
    let (no_ext, extension) = split_extension(file_name);
    let no_tags = strip_tags(&no_ext);

    let mut parsed = ParsedFilename {
        no_ext,
        extension,
        no_tags,
        ..Default::default()
    };

    for tag in raw_tags(file_name) {
        let lowered = tag.to_lowercase();
        if let Some((_, region)) = REGION_CODES.iter().find(|(code, _)| *code == lowered) {
            parsed.regions.push((*region).to_string());
        } else if REGION_NAMES.contains(&lowered.as_str()) {
            parsed.regions.push(tag);
        } else if let Some((_, language)) = LANGUAGE_CODES.iter().find(|(code, _)| *code == lowered)
        {
            parsed.languages.push((*language).to_string());
        } else if LANGUAGE_NAMES.contains(&lowered.as_str()) {
            parsed.languages.push(tag);
        } else if let Some(caps) = REGION_PREFIX_RE.captures(&tag) {
            parsed.regions.push(caps[1].to_string());
        } else if let Some(caps) = REVISION_RE.captures(&tag) {
            parsed.revision = caps[1].to_string();
        } else {
            parsed.tags.push(tag);
        }
    }

    parsed
}

/// Splits `game.tar.gz` into (`game`, `tar.gz`); directories and
/// extensionless files keep an empty extension.
pub fn split_extension(file_name: &str) -> (String, String) {
    match EXTENSION_RE.captures(file_name) {
        Some(caps) => {
            let extension = caps[1].to_string();
            let no_ext = file_name[..file_name.len() - extension.len() - 1].to_string();
            (no_ext, extension)
        }
        None => (file_name.to_string(), String::new()),
    }
}

fn strip_tags(no_ext: &str) -> String {
    let stripped = TAG_RE.replace_all(no_ext, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn raw_tags(file_name: &str) -> Vec<String> {
    TAG_RE
        .captures_iter(file_name)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .flat_map(|group| group.as_str().split(','))
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_filename_has_no_tags() {
        let parsed = parse("Tetris.gb");
        assert_eq!(parsed.no_ext, "Tetris");
        assert_eq!(parsed.extension, "gb");
        assert_eq!(parsed.no_tags, "Tetris");
        assert!(parsed.regions.is_empty());
        assert!(parsed.tags.is_empty());
    }

    #[test]
    fn no_intro_tags_are_classified() {
        let parsed = parse("Super Mario 64 (USA) (Rev 1).z64");
        assert_eq!(parsed.no_tags, "Super Mario 64");
        assert_eq!(parsed.regions, vec!["USA".to_string()]);
        assert_eq!(parsed.revision, "1");
        assert_eq!(parsed.extension, "z64");
        assert!(parsed.tags.is_empty());
    }

    #[test]
    fn goodtools_codes_expand_to_region_names() {
        let parsed = parse("Legend of Zelda, The (U) [!].n64");
        assert_eq!(parsed.regions, vec!["USA".to_string()]);
        assert_eq!(parsed.tags, vec!["!".to_string()]);
        // The comma in the title itself is not a tag separator.
        assert_eq!(parsed.no_tags, "Legend of Zelda, The");
    }

    #[test]
    fn language_lists_split_on_commas() {
        let parsed = parse("Final Fantasy VII (Europe) (En,Fr,De).chd");
        assert_eq!(parsed.regions, vec!["Europe".to_string()]);
        assert_eq!(
            parsed.languages,
            vec!["English".to_string(), "French".to_string(), "German".to_string()]
        );
    }

    #[test]
    fn reg_prefix_tags_carry_free_form_regions() {
        let parsed = parse("Some Game (reg-NTSC).iso");
        assert_eq!(parsed.regions, vec!["NTSC".to_string()]);
    }

    #[test]
    fn unknown_tags_are_kept_verbatim() {
        let parsed = parse("Shmup (Japan) (Beta) [h1].pce");
        assert_eq!(parsed.regions, vec!["Japan".to_string()]);
        assert_eq!(parsed.tags, vec!["Beta".to_string(), "h1".to_string()]);
    }

    #[test]
    fn compound_extensions_survive() {
        let (no_ext, ext) = split_extension("game.tar.gz");
        assert_eq!(no_ext, "game");
        assert_eq!(ext, "tar.gz");

        let (no_ext, ext) = split_extension("Multi Disc Game");
        assert_eq!(no_ext, "Multi Disc Game");
        assert_eq!(ext, "");
    }
}
