//! Kind registry: name/id bimaps for card, element and data-card kinds,
//! plus the allowed-value-kind table used when decomposing a card.

/// Position-assigned block kind of a card (see the lexer's block counter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardKind {
    Message,
    Title,
    Cell,
    Surface,
    Data,
    Comment,
    BlankLine,
}

impl CardKind {
    pub fn name(self) -> &'static str {
        match self {
            CardKind::Message => "message",
            CardKind::Title => "title",
            CardKind::Cell => "cell",
            CardKind::Surface => "surface",
            CardKind::Data => "data",
            CardKind::Comment => "comment",
            CardKind::BlankLine => "blankline",
        }
    }
}

/// Semantic category of an identifier carried by a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementKind {
    Cell,
    Surface,
    Material,
    Transformation,
    Tally,
    Universe,
    Fill,
}

const ELEMENT_TABLE: &[(&str, ElementKind)] = &[
    ("cell", ElementKind::Cell),
    ("surface", ElementKind::Surface),
    ("material", ElementKind::Material),
    ("transformation", ElementKind::Transformation),
    ("tally", ElementKind::Tally),
    ("universe", ElementKind::Universe),
    ("fill", ElementKind::Fill),
];

impl ElementKind {
    pub fn name(self) -> &'static str {
        ELEMENT_TABLE
            .iter()
            .find(|(_, k)| *k == self)
            .map(|(n, _)| *n)
            .expect("every ElementKind variant is registered")
    }

    /// Resolve a user-supplied token (e.g. the left side of a map-file
    /// line) to an `ElementKind`. Tolerant: the token matches if it is a
    /// prefix of the registered name, so `c`, `ce` and `cell` all resolve
    /// to `Cell`.
    pub fn from_prefix(token: &str) -> Option<ElementKind> {
        lookup_prefix(ELEMENT_TABLE, token)
    }

    /// Value kinds (element or parameter) recognized among a card's
    /// values for this element kind, used by the decomposer's parameter
    /// block parsing and by `Card::params`.
    pub fn allowed_value_kinds(self) -> &'static [ValueKind] {
        match self {
            ElementKind::Cell => &[
                ValueKind::Element(ElementKind::Material),
                ValueKind::Parameter(ParameterKind::Density),
                ValueKind::Parameter(ParameterKind::ImpN),
                ValueKind::Parameter(ParameterKind::ImpP),
                ValueKind::Element(ElementKind::Fill),
                ValueKind::Element(ElementKind::Universe),
                ValueKind::Element(ElementKind::Transformation),
                ValueKind::Parameter(ParameterKind::Temp),
            ],
            ElementKind::Surface => &[ValueKind::Element(ElementKind::Transformation)],
            ElementKind::Material => &[
                ValueKind::Parameter(ParameterKind::Nlib),
                ValueKind::Parameter(ParameterKind::MtKey),
            ],
            _ => &[],
        }
    }
}

/// Attributes (non-identifier values) that a card can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParameterKind {
    Density,
    ImpN,
    ImpP,
    Temp,
    Nlib,
    MtKey,
}

const PARAMETER_TABLE: &[(&str, ParameterKind)] = &[
    ("den", ParameterKind::Density),
    ("imp:n", ParameterKind::ImpN),
    ("imp:p", ParameterKind::ImpP),
    ("tmp", ParameterKind::Temp),
    ("nlib", ParameterKind::Nlib),
    ("mt", ParameterKind::MtKey),
];

impl ParameterKind {
    pub fn name(self) -> &'static str {
        PARAMETER_TABLE
            .iter()
            .find(|(_, k)| *k == self)
            .map(|(n, _)| *n)
            .expect("every ParameterKind variant is registered")
    }

    /// Resolve a parameter keyword token from a cell or material card's
    /// parameter block (e.g. `imp:n`, `tmp`, `nlib`).
    pub fn from_token(token: &str) -> Option<ParameterKind> {
        let lname = token.to_ascii_lowercase();
        PARAMETER_TABLE
            .iter()
            .find(|(n, _)| *n == lname)
            .map(|(_, k)| *k)
    }
}

/// Finer classification of a card in the data block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataCardKind {
    M,
    Mt,
    Mpn,
    F,
    Tr,
}

const DATA_CARD_TABLE: &[(&str, DataCardKind)] = &[
    ("m", DataCardKind::M),
    ("mt", DataCardKind::Mt),
    ("mpn", DataCardKind::Mpn),
    ("f", DataCardKind::F),
    ("tr", DataCardKind::Tr),
];

impl DataCardKind {
    pub fn name(self) -> &'static str {
        DATA_CARD_TABLE
            .iter()
            .find(|(_, k)| *k == self)
            .map(|(n, _)| *n)
            .expect("every DataCardKind variant is registered")
    }
}

/// Tagged union over the two closed kind sets a card's identifier values
/// may carry, mirroring the single namespace `values: [(value, kind)]`
/// of the data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKind {
    Element(ElementKind),
    Parameter(ParameterKind),
}

impl From<ElementKind> for ValueKind {
    fn from(k: ElementKind) -> Self {
        ValueKind::Element(k)
    }
}

impl From<ParameterKind> for ValueKind {
    fn from(k: ParameterKind) -> Self {
        ValueKind::Parameter(k)
    }
}

fn lookup_prefix<T: Copy>(table: &[(&str, T)], token: &str) -> Option<T> {
    let lname = token.trim().to_ascii_lowercase();
    if lname.is_empty() {
        return None;
    }
    table
        .iter()
        .find(|(name, _)| name.starts_with(lname.as_str()))
        .map(|(_, k)| *k)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_prefix_lookup_matches_abbreviations() {
        assert_eq!(ElementKind::from_prefix("c"), Some(ElementKind::Cell));
        assert_eq!(ElementKind::from_prefix("s"), Some(ElementKind::Surface));
        assert_eq!(ElementKind::from_prefix("m"), Some(ElementKind::Material));
        assert_eq!(ElementKind::from_prefix("u"), Some(ElementKind::Universe));
        assert_eq!(ElementKind::from_prefix("fill"), Some(ElementKind::Fill));
        assert_eq!(ElementKind::from_prefix("xyz"), None);
    }

    #[test]
    fn cell_allowed_value_kinds_cover_material_and_params() {
        let allowed = ElementKind::Cell.allowed_value_kinds();
        assert!(allowed.contains(&ValueKind::Element(ElementKind::Material)));
        assert!(allowed.contains(&ValueKind::Parameter(ParameterKind::ImpN)));
        assert!(allowed.contains(&ValueKind::Element(ElementKind::Fill)));
    }

    #[test]
    fn parameter_token_lookup_is_exact_not_prefix() {
        assert_eq!(ParameterKind::from_token("imp:n"), Some(ParameterKind::ImpN));
        assert_eq!(ParameterKind::from_token("IMP:N"), Some(ParameterKind::ImpN));
        assert_eq!(ParameterKind::from_token("imp"), None);
    }
}
