use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(ClientId);
id_newtype!(TransferId);
id_newtype!(TillId);

/// Name of a cash till as the backend knows it ("Caja 1", "Caja Principal").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TellerId(pub String);

impl TellerId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TellerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TellerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "asesor")]
    Advisor,
    #[serde(rename = "cajero")]
    Teller,
    #[serde(rename = "cajero-principal")]
    HeadTeller,
    #[serde(rename = "director-operativo")]
    OperationsDirector,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Advisor,
        Role::Teller,
        Role::HeadTeller,
        Role::OperationsDirector,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Advisor => "asesor",
            Role::Teller => "cajero",
            Role::HeadTeller => "cajero-principal",
            Role::OperationsDirector => "director-operativo",
        }
    }

    /// Accepts backend spellings such as `Cajero_Principal` or `director operativo`.
    pub fn parse(raw: &str) -> Option<Role> {
        let wanted = normalize_role(raw);
        Role::ALL
            .into_iter()
            .find(|role| normalize_role(role.as_str()) == wanted)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower-cases and collapses runs of `_`, `-` and whitespace into a single `-`.
pub fn normalize_role(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_separator = false;
    for ch in raw.trim().chars() {
        if ch == '_' || ch == '-' || ch.is_whitespace() {
            pending_separator = true;
            continue;
        }
        if pending_separator && !out.is_empty() {
            out.push('-');
        }
        pending_separator = false;
        out.extend(ch.to_lowercase());
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    #[default]
    Sent,
    Accepted,
}
