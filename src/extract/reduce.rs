use super::value::FieldValue;
use crate::ConfigError;

/// How a field's surviving entries become its final value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputProcessor {
    /// First surviving entry that is not empty text
    First,
    /// Entries rendered as text and joined with a separator
    Join(String),
    /// All surviving entries, in document order
    List,
    /// Whether the locator matched anything at all
    Presence,
}

impl OutputProcessor {
    /// Parses `first`, `join`, `join:<sep>`, `list` or `presence`
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let (name, arg) = match spec.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (spec, None),
        };

        match (name.trim(), arg) {
            ("first", None) => Ok(Self::First),
            ("list", None) => Ok(Self::List),
            ("presence", None) => Ok(Self::Presence),
            ("join", None) => Ok(Self::Join(" ".to_string())),
            ("join", Some(sep)) => Ok(Self::Join(sep.to_string())),
            ("first" | "list" | "presence", Some(_)) => {
                Err(ConfigError::InvalidProcessorArgument {
                    name: name.trim().to_string(),
                    message: "takes no argument".to_string(),
                })
            }
            (other, _) => Err(ConfigError::UnknownProcessor(other.to_string())),
        }
    }

    /// Reduces processed entries to a value; `None` means absent
    ///
    /// `Presence` is decided from raw matches before processing, see
    /// [`OutputProcessor::presence`].
    pub fn reduce(&self, entries: Vec<FieldValue>) -> Option<FieldValue> {
        match self {
            Self::First => entries.into_iter().find(|v| !v.is_empty_text()),
            Self::Join(sep) => {
                if entries.is_empty() {
                    return None;
                }
                let joined = entries
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(sep);
                Some(FieldValue::Text(joined))
            }
            Self::List => {
                if entries.is_empty() {
                    None
                } else {
                    Some(FieldValue::List(entries))
                }
            }
            Self::Presence => Some(FieldValue::Bool(!entries.is_empty())),
        }
    }

    /// Value of a presence field given the number of raw matches
    pub fn presence(raw_matches: usize) -> FieldValue {
        FieldValue::Bool(raw_matches > 0)
    }
}
