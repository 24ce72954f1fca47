//! Static place gazetteer used as the offline source of coordinates
//!
//! Three tables, all built once and never mutated:
//! - city entries (canonical name, UF, coordinates) in a fixed order
//! - one anchor per UF (the state capital's coordinates)
//! - the two-digit CEP prefix → UF table covering prefixes 01–99

use crate::models::Coordinates;
use crate::text::normalize;
use std::sync::LazyLock;

/// One named place
#[derive(Debug, Clone, PartialEq)]
pub struct GazetteerEntry {
    pub name: String,
    pub region_code: String,
    pub coordinates: Coordinates,
    normalized: String,
}

impl GazetteerEntry {
    pub fn new(name: &str, region_code: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.to_string(),
            region_code: region_code.to_string(),
            coordinates: Coordinates::new(latitude, longitude),
            normalized: normalize(name),
        }
    }
}

/// Which matching pass produced a city match
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchTier {
    /// Raw string equality
    Exact,
    /// Equality after normalization
    Normalized,
    /// Query is a substring of the entry
    QueryInEntry,
    /// Entry is a substring of the query
    EntryInQuery,
}

/// Result of [`Gazetteer::match_city`]
#[derive(Debug, Clone, PartialEq)]
pub struct CityMatch<'a> {
    pub entry: &'a GazetteerEntry,
    pub tier: MatchTier,
}

impl CityMatch<'_> {
    #[must_use]
    pub fn coordinates(&self) -> Coordinates {
        self.entry.coordinates
    }
}

/// In-memory place table
#[derive(Debug, Clone)]
pub struct Gazetteer {
    entries: Vec<GazetteerEntry>,
    regions: Vec<(String, Coordinates)>,
    prefixes: Vec<(u8, u8, String)>,
}

static BUILTIN: LazyLock<Gazetteer> = LazyLock::new(Gazetteer::brazil);

impl Gazetteer {
    /// Build a gazetteer from explicit tables
    #[must_use]
    pub fn new(
        entries: Vec<GazetteerEntry>,
        regions: Vec<(String, Coordinates)>,
        prefixes: Vec<(u8, u8, String)>,
    ) -> Self {
        Self {
            entries,
            regions,
            prefixes,
        }
    }

    /// The process-wide built-in table
    #[must_use]
    pub fn builtin() -> &'static Gazetteer {
        &BUILTIN
    }

    #[must_use]
    pub fn entries(&self) -> &[GazetteerEntry] {
        &self.entries
    }

    /// Find a city by name.
    ///
    /// Each pass scans every entry before the next pass starts, so a
    /// normalized-equality hit always beats a substring hit on an earlier
    /// entry. Substring passes can match unrelated places for short
    /// fragments; callers should treat tiers 3 and 4 as low precision.
    #[must_use]
    pub fn match_city(&self, name: &str) -> Option<CityMatch<'_>> {
        let query = normalize(name);
        if query.is_empty() {
            return None;
        }

        let passes: [(MatchTier, &dyn Fn(&GazetteerEntry) -> bool); 4] = [
            (MatchTier::Exact, &|e: &GazetteerEntry| e.name == name),
            (MatchTier::Normalized, &|e: &GazetteerEntry| e.normalized == query),
            (MatchTier::QueryInEntry, &|e: &GazetteerEntry| e.normalized.contains(&query)),
            (MatchTier::EntryInQuery, &|e: &GazetteerEntry| query.contains(&e.normalized)),
        ];

        passes.iter().find_map(|(tier, matches)| {
            self.entries
                .iter()
                .find(|e| matches(*e))
                .map(|entry| CityMatch { entry, tier: *tier })
        })
    }

    /// Anchor coordinates for a UF code (case-insensitive)
    #[must_use]
    pub fn centroid_for_region(&self, code: &str) -> Option<Coordinates> {
        let code = code.trim();
        self.regions
            .iter()
            .find(|(region, _)| region.eq_ignore_ascii_case(code))
            .map(|(_, coords)| *coords)
    }

    /// UF for the first two digits of a CEP
    #[must_use]
    pub fn region_for_postal_prefix(&self, prefix: &str) -> Option<&str> {
        if prefix.len() != 2 {
            return None;
        }
        let value: u8 = prefix.parse().ok()?;
        self.prefixes
            .iter()
            .find(|(low, high, _)| (*low..=*high).contains(&value))
            .map(|(_, _, region)| region.as_str())
    }

    fn brazil() -> Self {
        let entries = CITIES
            .iter()
            .map(|(name, uf, lat, lon)| GazetteerEntry::new(name, uf, *lat, *lon))
            .collect();
        let regions = REGIONS
            .iter()
            .map(|(uf, lat, lon)| ((*uf).to_string(), Coordinates::new(*lat, *lon)))
            .collect();
        let prefixes = CEP_PREFIXES
            .iter()
            .map(|(low, high, uf)| (*low, *high, (*uf).to_string()))
            .collect();
        Self::new(entries, regions, prefixes)
    }
}

const CITIES: &[(&str, &str, f64, f64)] = &[
    ("São Paulo", "SP", -23.5505, -46.6333),
    ("Rio de Janeiro", "RJ", -22.9068, -43.1729),
    ("Belo Horizonte", "MG", -19.9167, -43.9345),
    ("Brasília", "DF", -15.7939, -47.8828),
    ("Salvador", "BA", -12.9714, -38.5014),
    ("Fortaleza", "CE", -3.7319, -38.5267),
    ("Recife", "PE", -8.0476, -34.8770),
    ("Porto Alegre", "RS", -30.0346, -51.2177),
    ("Curitiba", "PR", -25.4284, -49.2733),
    ("Manaus", "AM", -3.1190, -60.0217),
    ("Belém", "PA", -1.4558, -48.4902),
    ("Goiânia", "GO", -16.6869, -49.2648),
    ("São Luís", "MA", -2.5307, -44.3068),
    ("Maceió", "AL", -9.6498, -35.7089),
    ("Natal", "RN", -5.7945, -35.2110),
    ("Teresina", "PI", -5.0892, -42.8019),
    ("João Pessoa", "PB", -7.1195, -34.8450),
    ("Aracaju", "SE", -10.9472, -37.0731),
    ("Cuiabá", "MT", -15.6014, -56.0979),
    ("Campo Grande", "MS", -20.4697, -54.6201),
    ("Florianópolis", "SC", -27.5954, -48.5480),
    ("Vitória", "ES", -20.3155, -40.3128),
    ("Porto Velho", "RO", -8.7612, -63.9004),
    ("Rio Branco", "AC", -9.9754, -67.8249),
    ("Macapá", "AP", 0.0349, -51.0694),
    ("Boa Vista", "RR", 2.8235, -60.6758),
    ("Palmas", "TO", -10.2491, -48.3243),
    ("Campinas", "SP", -22.9099, -47.0626),
    ("Santos", "SP", -23.9608, -46.3336),
    ("Guarulhos", "SP", -23.4543, -46.5337),
    ("São Bernardo do Campo", "SP", -23.6914, -46.5646),
    ("Santo André", "SP", -23.6639, -46.5383),
    ("Osasco", "SP", -23.5325, -46.7917),
    ("Ribeirão Preto", "SP", -21.1775, -47.8103),
    ("Sorocaba", "SP", -23.5015, -47.4526),
    ("São José dos Campos", "SP", -23.1896, -45.8841),
    ("Niterói", "RJ", -22.8832, -43.1034),
    ("Duque de Caxias", "RJ", -22.7858, -43.3117),
    ("Nova Iguaçu", "RJ", -22.7592, -43.4511),
    ("Uberlândia", "MG", -18.9186, -48.2772),
    ("Contagem", "MG", -19.9320, -44.0539),
    ("Juiz de Fora", "MG", -21.7642, -43.3496),
    ("Joinville", "SC", -26.3045, -48.8487),
    ("Londrina", "PR", -23.3045, -51.1696),
    ("Caxias do Sul", "RS", -29.1678, -51.1794),
    ("Feira de Santana", "BA", -12.2664, -38.9663),
    ("Jaboatão dos Guararapes", "PE", -8.1130, -35.0150),
];

const REGIONS: &[(&str, f64, f64)] = &[
    ("AC", -9.9754, -67.8249),
    ("AL", -9.6498, -35.7089),
    ("AP", 0.0349, -51.0694),
    ("AM", -3.1190, -60.0217),
    ("BA", -12.9714, -38.5014),
    ("CE", -3.7319, -38.5267),
    ("DF", -15.7939, -47.8828),
    ("ES", -20.3155, -40.3128),
    ("GO", -16.6869, -49.2648),
    ("MA", -2.5307, -44.3068),
    ("MT", -15.6014, -56.0979),
    ("MS", -20.4697, -54.6201),
    ("MG", -19.9167, -43.9345),
    ("PA", -1.4558, -48.4902),
    ("PB", -7.1195, -34.8450),
    ("PR", -25.4284, -49.2733),
    ("PE", -8.0476, -34.8770),
    ("PI", -5.0892, -42.8019),
    ("RJ", -22.9068, -43.1729),
    ("RN", -5.7945, -35.2110),
    ("RS", -30.0346, -51.2177),
    ("RO", -8.7612, -63.9004),
    ("RR", 2.8235, -60.6758),
    ("SC", -27.5954, -48.5480),
    ("SP", -23.5505, -46.6333),
    ("SE", -10.9472, -37.0731),
    ("TO", -10.2491, -48.3243),
];

// Inclusive two-digit ranges. Where a UF boundary falls inside a two-digit
// prefix (689 AP, 693 RR, 699 AC, 728 GO, 768 RO) the prefix goes to the UF
// that owns most of it. Prefix 00 is not assigned to any UF and stays
// unmapped.
const CEP_PREFIXES: &[(u8, u8, &str)] = &[
    (1, 19, "SP"),
    (20, 28, "RJ"),
    (29, 29, "ES"),
    (30, 39, "MG"),
    (40, 48, "BA"),
    (49, 49, "SE"),
    (50, 56, "PE"),
    (57, 57, "AL"),
    (58, 58, "PB"),
    (59, 59, "RN"),
    (60, 63, "CE"),
    (64, 64, "PI"),
    (65, 65, "MA"),
    (66, 68, "PA"),
    (69, 69, "AM"),
    (70, 72, "DF"),
    (73, 76, "GO"),
    (77, 77, "TO"),
    (78, 78, "MT"),
    (79, 79, "MS"),
    (80, 87, "PR"),
    (88, 89, "SC"),
    (90, 99, "RS"),
];
