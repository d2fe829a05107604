use wasm_bindgen::JsValue;

#[derive(Debug)]
pub enum PolylineError {
    XmlParse(quick_xml::Error),
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },
    InvalidAttribute {
        element: &'static str,
        attribute: &'static str,
        value: String,
    },
    InvalidTime {
        value: String,
    },
    /// A GeoJSON position must hold `[lng, lat]` or `[lng, lat, alt]`.
    InvalidPosition {
        len: usize,
    },
    Elevation(String),
    Serialize(String),
    /// Reported by `DualChain::check_invariants`.
    BrokenChain(String),
}

impl std::fmt::Display for PolylineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::XmlParse(e) => write!(f, "XML parse error: {e}"),
            Self::MissingAttribute { element, attribute } => {
                write!(f, "Missing attribute '{attribute}' on <{element}>")
            }
            Self::InvalidAttribute {
                element,
                attribute,
                value,
            } => write!(
                f,
                "Invalid value '{value}' for attribute '{attribute}' on <{element}>"
            ),
            Self::InvalidTime { value } => write!(f, "Invalid RFC 3339 time '{value}'"),
            Self::InvalidPosition { len } => write!(
                f,
                "Position must have 2 or 3 coordinates, got {len}"
            ),
            Self::Elevation(msg) => write!(f, "Elevation service error: {msg}"),
            Self::Serialize(msg) => write!(f, "Serialization error: {msg}"),
            Self::BrokenChain(msg) => write!(f, "Broken chain: {msg}"),
        }
    }
}

impl std::error::Error for PolylineError {}

impl From<quick_xml::Error> for PolylineError {
    fn from(e: quick_xml::Error) -> Self {
        Self::XmlParse(e)
    }
}

impl From<serde_json::Error> for PolylineError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialize(e.to_string())
    }
}

impl From<serde_wasm_bindgen::Error> for PolylineError {
    fn from(e: serde_wasm_bindgen::Error) -> Self {
        Self::Serialize(e.to_string())
    }
}

impl From<PolylineError> for JsValue {
    fn from(e: PolylineError) -> Self {
        JsValue::from_str(&e.to_string())
    }
}
