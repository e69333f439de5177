use crate::config;
use crate::error::{Error, Result};
use hashbrown::HashMap;
use std::mem;

/// Characters fused into the surrounding token with a link substitute.
pub const DEFAULT_LINK_CHARS: &str = "’`'?!/;:.,–-— )(+&%*#^[]{}<>_";
/// Space characters besides code points <= 32.
pub const DEFAULT_SPACE_CHARS: &str = "\t\u{8}\n\r ";
/// Characters splitting the input into separate tokens.
pub const DEFAULT_SEPARATOR_CHARS: &str = "\",;.:";
const DEFAULT_SPACE_SUBST: char = '_';
const DEFAULT_LINK_SUBST: char = '-';
const DEFAULT_COVER_SIMILARITY: f64 = 0.6;
const DEFAULT_TYPES: &str = "E / N,V";

/// Normalizes arbitrary UTF-8 text into search keys: separator characters
/// split tokens, link characters and space runs collapse into single
/// substitute characters, everything else passes through verbatim.
#[derive(Debug, Clone)]
pub struct Normalizer {
    link_chars: Vec<char>,
    space_chars: Vec<char>,
    separator_chars: Vec<char>,
    space_subst: char,
    link_subst: char,
    /// Minimum vector similarity regarded as covering; carried for callers.
    pub cover_similarity: f64,
    /// Feature type name to priority, lower is more important.
    pub type_priorities: HashMap<String, i32>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            link_chars: DEFAULT_LINK_CHARS.chars().collect(),
            space_chars: DEFAULT_SPACE_CHARS.chars().collect(),
            separator_chars: DEFAULT_SEPARATOR_CHARS.chars().collect(),
            space_subst: DEFAULT_SPACE_SUBST,
            link_subst: DEFAULT_LINK_SUBST,
            cover_similarity: DEFAULT_COVER_SIMILARITY,
            type_priorities: parse_type_priorities(DEFAULT_TYPES),
        }
    }
}

impl Normalizer {
    /// Build a normalizer from a `key=value; ...` configuration string.
    /// Character lists (`link`, `space`, `sep`) accept `&#NNN;` entity
    /// references; lists containing `;` (entity references included) must
    /// be double-quoted. `spacesb` and `linksb` take a single ASCII character;
    /// `coversim` takes a float in [0,1]; `types` takes a priority list
    /// where commas group names and `:` or `/` advance the priority.
    pub fn from_config_str(source: &str) -> Result<Self> {
        let mut normalizer = Self::default();
        for (key, value) in config::entries(source)? {
            match key.as_str() {
                "link" => normalizer.link_chars = parse_char_list(&value)?,
                "space" => normalizer.space_chars = parse_char_list(&value)?,
                "sep" => normalizer.separator_chars = parse_char_list(&value)?,
                "spacesb" => normalizer.space_subst = parse_subst_char(&key, &value)?,
                "linksb" => normalizer.link_subst = parse_subst_char(&key, &value)?,
                "coversim" => {
                    let similarity: f64 = value.parse().map_err(|_| {
                        Error::Config(format!("coversim needs a float, got '{value}'"))
                    })?;
                    if !(0.0..=1.0).contains(&similarity) {
                        return Err(Error::Config(format!(
                            "coversim must lie in [0,1], got '{value}'"
                        )));
                    }
                    normalizer.cover_similarity = similarity;
                }
                "types" => normalizer.type_priorities = parse_type_priorities(&value),
                other => {
                    return Err(Error::Config(format!("unknown key '{other}'")));
                }
            }
        }
        Ok(normalizer)
    }

    /// Normalize a source string into search key tokens.
    #[must_use]
    pub fn normalize(&self, source: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut current = String::new();
        for ch in source.chars() {
            // Separator membership is tested first; several characters are
            // both separators and link characters.
            if self.separator_chars.contains(&ch) {
                self.emit(&mut tokens, &mut current);
            } else if self.link_chars.contains(&ch) {
                self.trim_space_subst(&mut current);
                current.push(self.link_subst);
            } else if (ch as u32) <= 32 || self.space_chars.contains(&ch) {
                self.trim_space_subst(&mut current);
                if !current.is_empty() && !current.ends_with(self.link_subst) {
                    current.push(self.space_subst);
                }
            } else {
                current.push(ch);
            }
        }
        self.emit(&mut tokens, &mut current);
        tokens
    }

    fn trim_space_subst(&self, current: &mut String) {
        while current.ends_with(self.space_subst) {
            current.pop();
        }
    }

    /// Emit the current buffer as a token, trimming trailing substitution
    /// characters; tokens reduced to nothing are dropped.
    fn emit(&self, tokens: &mut Vec<String>, current: &mut String) {
        while current.ends_with(self.space_subst) || current.ends_with(self.link_subst) {
            current.pop();
        }
        if !current.is_empty() {
            tokens.push(mem::take(current));
        }
    }
}

/// Parse a character list, resolving `&#NNN;` entity references. A `&` that
/// does not start a well-formed entity is taken verbatim.
fn parse_char_list(source: &str) -> Result<Vec<char>> {
    let mut chars = Vec::new();
    let mut rest = source;
    while let Some(ch) = rest.chars().next() {
        if ch == '&' {
            if let Some((value, after)) = parse_numeric_entity(rest) {
                let ch = char::from_u32(value).ok_or_else(|| {
                    Error::Config(format!("character definition &#{value}; out of range"))
                })?;
                chars.push(ch);
                rest = after;
                continue;
            }
        }
        chars.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    Ok(chars)
}

fn parse_numeric_entity(source: &str) -> Option<(u32, &str)> {
    let digits = source.strip_prefix("&#")?;
    let end = digits.find(|c: char| !c.is_ascii_digit())?;
    if end == 0 {
        return None;
    }
    let rest = digits[end..].strip_prefix(';')?;
    Some((digits[..end].parse().ok()?, rest))
}

fn parse_subst_char(key: &str, value: &str) -> Result<char> {
    if value.len() == 1 && value.is_ascii() {
        Ok(value.as_bytes()[0] as char)
    } else {
        Err(Error::Config(format!(
            "{key} needs a single ASCII character, got '{value}'"
        )))
    }
}

/// Parse a type priority list: commas group names at the same priority, `:`
/// and `/` advance it by one.
fn parse_type_priorities(source: &str) -> HashMap<String, i32> {
    fn is_type_char(ch: char) -> bool {
        ch.is_ascii_alphanumeric() || ch == '_' || ch == '-'
    }

    let mut priorities = HashMap::new();
    let mut priority = 0;
    let mut chars = source.chars().peekable();
    while let Some(&ch) = chars.peek() {
        if ch == ':' || ch == '/' {
            chars.next();
            priority += 1;
        } else if is_type_char(ch) {
            let mut name = String::new();
            while let Some(&ch) = chars.peek() {
                if !is_type_char(ch) {
                    break;
                }
                name.push(ch);
                chars.next();
            }
            priorities.insert(name, priority);
        } else {
            chars.next();
        }
    }
    priorities
}

#[cfg(test)]
mod tests {
    use super::Normalizer;
    use crate::error::Error;

    #[test]
    fn splits_on_separators_and_fuses_links() {
        let normalizer = Normalizer::default();
        assert_eq!(
            normalizer.normalize("Hello,  World-Wide!"),
            vec!["Hello", "World-Wide"]
        );
    }

    #[test]
    fn spaces_collapse_into_one_substitute() {
        let normalizer = Normalizer::default();
        assert_eq!(normalizer.normalize("New   York"), vec!["New_York"]);
        assert_eq!(normalizer.normalize("  padded  "), vec!["padded"]);
    }

    #[test]
    fn link_chars_absorb_surrounding_spaces() {
        let normalizer = Normalizer::default();
        assert_eq!(normalizer.normalize("a / b"), vec!["a-b"]);
        assert_eq!(normalizer.normalize("a – b"), vec!["a-b"]);
    }

    #[test]
    fn separators_split_into_multiple_tokens() {
        let normalizer = Normalizer::default();
        assert_eq!(
            normalizer.normalize("first\"second\"third"),
            vec!["first", "second", "third"]
        );
    }

    #[test]
    fn token_of_only_link_chars_is_dropped() {
        let normalizer = Normalizer::default();
        assert_eq!(normalizer.normalize("!!!"), Vec::<String>::new());
    }

    #[test]
    fn config_string_overrides_char_classes() {
        let normalizer =
            Normalizer::from_config_str("link=\"&#43;\"; sep=|; spacesb=+; linksb=~").unwrap();
        assert_eq!(normalizer.normalize("a+b|c d"), vec!["a~b", "c+d"]);
    }

    #[test]
    fn entity_references_resolve_in_char_lists() {
        // &#44; is a comma; a lone '&' stays verbatim.
        let normalizer = Normalizer::from_config_str("sep=\"&#44;&x\"").unwrap();
        assert_eq!(normalizer.normalize("a,b&cxd"), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn type_priorities_follow_group_and_advance_rules() {
        let normalizer = Normalizer::from_config_str("types=E / N,V").unwrap();
        assert_eq!(normalizer.type_priorities.get("E"), Some(&0));
        assert_eq!(normalizer.type_priorities.get("N"), Some(&1));
        assert_eq!(normalizer.type_priorities.get("V"), Some(&1));
    }

    #[test]
    fn coversim_outside_unit_interval_is_rejected() {
        assert!(matches!(
            Normalizer::from_config_str("coversim=1.5"),
            Err(Error::Config(_))
        ));
        let normalizer = Normalizer::from_config_str("coversim=0.75").unwrap();
        assert!((normalizer.cover_similarity - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn subst_chars_must_be_single_ascii() {
        assert!(matches!(
            Normalizer::from_config_str("spacesb=ab"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Normalizer::from_config_str("linksb=é"),
            Err(Error::Config(_))
        ));
    }
}
