//! Normalises the state field of a BundleDeployment status.
//!
//! Depending on the schema version the state is published either as
//! `status.display.state` or as a flat `status.state`. The richer display
//! shape wins when both are present.

use serde_json::Value;

const DISPLAY_STATE: &str = "/status/display/state";
const FLAT_STATE: &str = "/status/state";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusShape<'a> {
    Display(&'a str),
    Flat(&'a str),
    Missing,
}

impl<'a> StatusShape<'a> {
    pub fn detect(body: &'a Value) -> Self {
        let field = |pointer: &str| {
            body.pointer(pointer)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
        };

        if let Some(state) = field(DISPLAY_STATE) {
            StatusShape::Display(state)
        } else if let Some(state) = field(FLAT_STATE) {
            StatusShape::Flat(state)
        } else {
            StatusShape::Missing
        }
    }

    pub fn raw_state(&self) -> Option<&'a str> {
        match *self {
            StatusShape::Display(s) | StatusShape::Flat(s) => Some(s),
            StatusShape::Missing => None,
        }
    }
}
