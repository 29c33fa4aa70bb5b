use dealscout_core::AppConfig;

pub const DEFAULT_TIE_BAND: f64 = 0.50;
pub const DEFAULT_LIST_TIE_BAND: f64 = 2.00;
pub const DEFAULT_MAX_DEALS: usize = 100;
pub const DEFAULT_RADIUS_MILES: f64 = 10.0;

/// Float slack so a gap of exactly one band still counts as a tie.
const BAND_EPSILON: f64 = 1e-9;

/// Knobs for best-value selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComparisonPolicy {
    /// A pricier option within this many dollars wins if it is strictly closer.
    pub tie_band: f64,
    /// Same rule applied to whole shopping-list totals.
    pub list_tie_band: f64,
    /// Upper bound on deals fetched per item lookup.
    pub max_deals: usize,
    pub default_radius_miles: f64,
}

impl Default for ComparisonPolicy {
    fn default() -> Self {
        Self {
            tie_band: DEFAULT_TIE_BAND,
            list_tie_band: DEFAULT_LIST_TIE_BAND,
            max_deals: DEFAULT_MAX_DEALS,
            default_radius_miles: DEFAULT_RADIUS_MILES,
        }
    }
}

impl ComparisonPolicy {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            tie_band: config.tie_band,
            list_tie_band: config.list_tie_band,
            max_deals: DEFAULT_MAX_DEALS,
            default_radius_miles: config.default_radius_miles,
        }
    }
}

/// Walks `candidates` in ascending cost order. A candidate replaces the
/// current pick when its cost is within `band` of it and it is strictly
/// closer; an unknown distance counts as infinitely far.
pub(crate) fn pick_best<'a, T>(
    candidates: impl IntoIterator<Item = &'a T>,
    band: f64,
    cost: impl Fn(&T) -> f64,
    distance: impl Fn(&T) -> Option<f64>,
) -> Option<&'a T>
where
    T: 'a,
{
    let far = |d: Option<f64>| d.unwrap_or(f64::INFINITY);
    candidates.into_iter().reduce(|best, candidate| {
        let within_band = cost(candidate) - cost(best) <= band + BAND_EPSILON;
        if within_band && far(distance(candidate)) < far(distance(best)) {
            candidate
        } else {
            best
        }
    })
}
