use serde::{Deserialize, Serialize};

/// * `key` - Unique racer identifier, e.g. the session id handed over by the entry collaborator
/// * `display_name` - Name shown by the rendering collaborator
/// * `is_human` - Marks the human-controlled racer, which receives a small pace bonus
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct Racer {
    pub key: String,
    pub display_name: String,
    #[serde(default)]
    pub is_human: bool,
}

impl Racer {
    pub fn new(key: &str, display_name: &str, is_human: bool) -> Racer {
        Racer {
            key: key.to_owned(),
            display_name: display_name.to_owned(),
            is_human,
        }
    }
}
