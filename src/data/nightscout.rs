//! Nightscout REST API integration.
//!
//! Raw sensor readings come from `entries/sgv` (`unfiltered` field), the
//! device calibration from `entries/cal`, and sensor starts / finger checks
//! from `treatments`.

use chrono::{DateTime, Duration, Utc};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::data::source::DataSource;
use crate::domain::{CalibrationRecord, FingerCheck, RawEntry, TimeRange};
use crate::error::AppError;

const ENTRIES_SGV: &str = "api/v1/entries/sgv.json";
const ENTRIES_CAL: &str = "api/v1/entries/cal.json";
const TREATMENTS: &str = "api/v1/treatments.json";

const EVENT_SENSOR_START: &str = "Sensor Start";
const GLUCOSE_TYPE_FINGER: &str = "Finger";

/// Entries per page when paging back to the previous raw reading.
const RAW_PAGE: usize = 12;
/// Entries per forward window; `MAX_LOOKAHEAD_HOURS` keeps windows below it.
const FORWARD_LIMIT: usize = 1_000;
/// Upper bound on finger checks returned for one range.
const CHECK_LIMIT: usize = 10_000;
const DEFAULT_LOOKAHEAD_MINUTES: i64 = 30;
/// Forward lookups stop widening at this distance from the target.
const MAX_LOOKAHEAD_HOURS: i64 = 24;
const MMOL_TO_MGDL: f64 = 18.0;

/// Connection settings for a Nightscout site.
#[derive(Debug, Clone)]
pub struct NightscoutConfig {
    pub base_url: String,
    pub token: Option<String>,
    /// How far past a target the forward raw lookup searches.
    pub lookahead: Duration,
}

impl NightscoutConfig {
    /// Read `NIGHTSCOUT_URL`, `NIGHTSCOUT_TOKEN` and
    /// `NIGHTSCOUT_LOOKAHEAD_MINUTES` from the environment (and `.env`).
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let base_url = std::env::var("NIGHTSCOUT_URL")
            .map_err(|_| AppError::new(2, "Missing NIGHTSCOUT_URL in environment (.env)."))?;
        let token = std::env::var("NIGHTSCOUT_TOKEN").ok().filter(|t| !t.trim().is_empty());
        let lookahead = match std::env::var("NIGHTSCOUT_LOOKAHEAD_MINUTES") {
            Ok(v) => v
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|m| *m > 0)
                .ok_or_else(|| {
                    AppError::new(2, format!("Invalid NIGHTSCOUT_LOOKAHEAD_MINUTES '{v}'."))
                })?,
            Err(_) => DEFAULT_LOOKAHEAD_MINUTES,
        };
        Ok(Self {
            base_url,
            token,
            lookahead: Duration::minutes(lookahead),
        })
    }

    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token,
            lookahead: Duration::minutes(DEFAULT_LOOKAHEAD_MINUTES),
        }
    }
}

pub struct NightscoutClient {
    client: Client,
    config: NightscoutConfig,
}

impl NightscoutClient {
    pub fn new(config: NightscoutConfig) -> Result<Self, AppError> {
        let base = config.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(AppError::new(
                2,
                format!("Nightscout URL must start with http:// or https:// (got '{base}')."),
            ));
        }
        Ok(Self {
            client: Client::new(),
            config,
        })
    }

    pub fn from_env() -> Result<Self, AppError> {
        Self::new(NightscoutConfig::from_env()?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim().trim_end_matches('/'))
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, AppError> {
        let url = self.url(path);
        log::debug!("GET {url} {query:?}");

        let mut req = self.client.get(&url).query(query);
        if let Some(token) = &self.config.token {
            req = req.query(&[("token", token)]);
        }

        let resp = req
            .send()
            .map_err(|e| AppError::new(4, format!("Nightscout request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::new(
                4,
                format!("Nightscout request to {path} failed with status {}.", resp.status()),
            ));
        }

        resp.json().map_err(|e| {
            AppError::new(4, format!("Failed to parse Nightscout response from {path}: {e}"))
        })
    }

    fn fetch_entries(&self, query: EntryQuery) -> Result<Vec<SgvEntry>, AppError> {
        self.get_json(ENTRIES_SGV, &query.params())
    }
}

impl DataSource for NightscoutClient {
    fn fetch_sensor_starts(&self, limit: usize) -> Result<Vec<DateTime<Utc>>, AppError> {
        let treatments: Vec<Treatment> = self.get_json(
            TREATMENTS,
            &[
                ("find[eventType]", EVENT_SENSOR_START.to_string()),
                ("count", limit.to_string()),
            ],
        )?;

        let mut starts = treatments
            .iter()
            .map(Treatment::timestamp)
            .collect::<Result<Vec<_>, _>>()?;
        starts.sort_by(|a, b| b.cmp(a));
        starts.dedup();
        starts.truncate(limit);
        Ok(starts)
    }

    fn fetch_finger_checks(&self, range: TimeRange) -> Result<Vec<FingerCheck>, AppError> {
        let mut query = vec![
            ("find[glucoseType]", GLUCOSE_TYPE_FINGER.to_string()),
            ("find[created_at][$gt]", iso(range.start)),
            ("count", CHECK_LIMIT.to_string()),
        ];
        if let Some(end) = range.end {
            query.push(("find[created_at][$lt]", iso(end)));
        }

        let treatments: Vec<Treatment> = self.get_json(TREATMENTS, &query)?;
        warn_if_truncated("finger checks", treatments.len(), CHECK_LIMIT);
        select_checks(&treatments, range)
    }

    fn fetch_raw_before(&self, ts: DateTime<Utc>) -> Result<Option<RawEntry>, AppError> {
        scan_before(ts, |query| self.fetch_entries(query))
    }

    fn fetch_raw_after(&self, ts: DateTime<Utc>) -> Result<Option<RawEntry>, AppError> {
        scan_after(ts, self.config.lookahead, |query| self.fetch_entries(query))
    }

    fn fetch_calibration_record(
        &self,
        ts: DateTime<Utc>,
    ) -> Result<Option<CalibrationRecord>, AppError> {
        let records: Vec<CalEntry> = self.get_json(
            ENTRIES_CAL,
            &[
                ("find[date][$lte]", ts.timestamp_millis().to_string()),
                ("count", "1".to_string()),
            ],
        )?;
        Ok(records.into_iter().find_map(CalEntry::into_record))
    }
}

/// One page request against `entries/sgv`, bounds in epoch millis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryQuery {
    /// The newest `count` entries strictly before `before`.
    Before { before: i64, count: usize },
    /// The newest `count` entries in `(after, through]`.
    Window { after: i64, through: i64, count: usize },
}

impl EntryQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        match *self {
            Self::Before { before, count } => vec![
                ("find[date][$lt]", before.to_string()),
                ("count", count.to_string()),
            ],
            Self::Window { after, through, count } => vec![
                ("find[date][$gt]", after.to_string()),
                ("find[date][$lte]", through.to_string()),
                ("count", count.to_string()),
            ],
        }
    }
}

/// Page backwards from `ts` until an entry with a raw value turns up or the
/// history runs out.
fn scan_before<F>(ts: DateTime<Utc>, mut fetch: F) -> Result<Option<RawEntry>, AppError>
where
    F: FnMut(EntryQuery) -> Result<Vec<SgvEntry>, AppError>,
{
    let mut cursor = ts.timestamp_millis();
    loop {
        let page = fetch(EntryQuery::Before {
            before: cursor,
            count: RAW_PAGE,
        })?;
        if let Some(found) = nearest_before(&page, ts) {
            return Ok(Some(found));
        }
        // The cursor must move strictly back or the scan stops.
        let oldest = page
            .iter()
            .filter_map(SgvEntry::date_millis)
            .filter(|ms| *ms < cursor)
            .min();
        let Some(oldest) = oldest else {
            return Ok(None);
        };
        log::debug!("No raw value in {} entries before {ts}; paging back.", page.len());
        cursor = oldest;
    }
}

/// Search forward from `ts` in widening windows (see `forward_windows`).
fn scan_after<F>(
    ts: DateTime<Utc>,
    lookahead: Duration,
    mut fetch: F,
) -> Result<Option<RawEntry>, AppError>
where
    F: FnMut(EntryQuery) -> Result<Vec<SgvEntry>, AppError>,
{
    for query in forward_windows(ts, lookahead) {
        let page = fetch(query)?;
        warn_if_truncated("raw entries", page.len(), FORWARD_LIMIT);
        if let Some(found) = nearest_after(&page, ts) {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// Contiguous windows after `ts`: the first spans `lookahead`, each later one
/// doubles the covered distance, up to `MAX_LOOKAHEAD_HOURS`.
///
/// Entries are served newest first, so an open-ended `$gt` query would return
/// the latest readings instead of the nearest ones.
fn forward_windows(ts: DateTime<Utc>, lookahead: Duration) -> Vec<EntryQuery> {
    let first = lookahead.max(Duration::minutes(1));
    let cap = Duration::hours(MAX_LOOKAHEAD_HOURS).max(first);

    let mut windows = Vec::new();
    let mut covered = Duration::zero();
    let mut reach = first;
    loop {
        windows.push(EntryQuery::Window {
            after: (ts + covered).timestamp_millis(),
            through: (ts + reach).timestamp_millis(),
            count: FORWARD_LIMIT,
        });
        if reach >= cap {
            return windows;
        }
        covered = reach;
        reach = (reach * 2).min(cap);
    }
}

fn nearest_before(page: &[SgvEntry], ts: DateTime<Utc>) -> Option<RawEntry> {
    page.iter()
        .filter_map(SgvEntry::raw_entry)
        .filter(|e| e.timestamp < ts)
        .max_by_key(|e| e.timestamp)
}

fn nearest_after(page: &[SgvEntry], ts: DateTime<Utc>) -> Option<RawEntry> {
    page.iter()
        .filter_map(SgvEntry::raw_entry)
        .filter(|e| e.timestamp > ts)
        .min_by_key(|e| e.timestamp)
}

/// Finger checks strictly inside `range`, most recent first.
fn select_checks(treatments: &[Treatment], range: TimeRange) -> Result<Vec<FingerCheck>, AppError> {
    let mut checks = Vec::with_capacity(treatments.len());
    for t in treatments {
        let Some(glucose) = t.glucose_mgdl() else {
            log::debug!("Skipping finger check without a usable glucose value: {t:?}");
            continue;
        };
        let timestamp = t.timestamp()?;
        // The $gt/$lt filters compare ISO strings server-side; re-check exactly.
        if !range.contains(timestamp) {
            continue;
        }
        checks.push(FingerCheck {
            timestamp,
            glucose,
            is_calibration: t.is_calibration(),
        });
    }
    checks.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(checks)
}

/// A response as long as the requested `count` may have been cut short.
fn warn_if_truncated(what: &str, len: usize, limit: usize) -> bool {
    let full = len >= limit;
    if full {
        log::warn!(
            "Nightscout returned {len} {what}, the request limit; some records may be missing."
        );
    }
    full
}

fn iso(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn millis_to_utc(ms: f64) -> Option<DateTime<Utc>> {
    if !ms.is_finite() {
        return None;
    }
    DateTime::<Utc>::from_timestamp_millis(ms as i64)
}

#[derive(Debug, Clone, Deserialize)]
struct SgvEntry {
    date: f64,
    #[serde(default)]
    unfiltered: Option<f64>,
}

impl SgvEntry {
    /// Zero means the uploader had no raw value for this reading.
    fn raw_entry(&self) -> Option<RawEntry> {
        let raw = self.unfiltered.filter(|v| v.is_finite() && *v != 0.0)?;
        Some(RawEntry {
            timestamp: millis_to_utc(self.date)?,
            raw: Some(raw),
        })
    }

    fn date_millis(&self) -> Option<i64> {
        self.date.is_finite().then_some(self.date as i64)
    }
}

#[derive(Debug, Deserialize)]
struct CalEntry {
    date: f64,
    slope: Option<f64>,
    intercept: Option<f64>,
}

impl CalEntry {
    fn into_record(self) -> Option<CalibrationRecord> {
        Some(CalibrationRecord {
            timestamp: millis_to_utc(self.date)?,
            slope: self.slope.filter(|v| v.is_finite())?,
            intercept: self.intercept.filter(|v| v.is_finite())?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct Treatment {
    created_at: String,
    #[serde(default, rename = "eventType")]
    event_type: Option<String>,
    /// Uploaders send this as either a number or a string.
    #[serde(default)]
    glucose: Option<serde_json::Value>,
    #[serde(default)]
    units: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

impl Treatment {
    fn timestamp(&self) -> Result<DateTime<Utc>, AppError> {
        DateTime::parse_from_rfc3339(&self.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                AppError::new(4, format!("Invalid treatment timestamp '{}': {e}", self.created_at))
            })
    }

    fn glucose_mgdl(&self) -> Option<f64> {
        let value = match self.glucose.as_ref()? {
            serde_json::Value::Number(n) => n.as_f64()?,
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        let is_mmol = self
            .units
            .as_deref()
            .is_some_and(|u| u.to_ascii_lowercase().starts_with("mmol"));
        let mgdl = if is_mmol { value * MMOL_TO_MGDL } else { value };
        (mgdl.is_finite() && mgdl > 0.0).then_some(mgdl)
    }

    fn is_calibration(&self) -> bool {
        let mentions = |field: &Option<String>| {
            field
                .as_deref()
                .is_some_and(|s| s.to_ascii_lowercase().contains("calibration"))
        };
        mentions(&self.event_type) || mentions(&self.notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const T: i64 = 1_682_935_200_000;
    const MINUTE: i64 = 60_000;

    fn treatment(json: &str) -> Treatment {
        serde_json::from_str(json).unwrap()
    }

    fn sgv(date: i64, unfiltered: f64) -> SgvEntry {
        SgvEntry {
            date: date as f64,
            unfiltered: Some(unfiltered),
        }
    }

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    /// Answers entry queries from `entries` the way Nightscout does: matching
    /// entries, newest first, at most `count`. Records every query it serves.
    fn serve(
        entries: Vec<SgvEntry>,
        log: &mut Vec<EntryQuery>,
    ) -> impl FnMut(EntryQuery) -> Result<Vec<SgvEntry>, AppError> + '_ {
        move |query| {
            log.push(query);
            let admits = |ms: i64| match query {
                EntryQuery::Before { before, .. } => ms < before,
                EntryQuery::Window { after, through, .. } => ms > after && ms <= through,
            };
            let count = match query {
                EntryQuery::Before { count, .. } | EntryQuery::Window { count, .. } => count,
            };
            let mut page: Vec<SgvEntry> = entries
                .iter()
                .filter(|e| admits(e.date as i64))
                .cloned()
                .collect();
            page.sort_by(|a, b| b.date.total_cmp(&a.date));
            page.truncate(count);
            Ok(page)
        }
    }

    #[test]
    fn treatments_response_parses_with_snake_case_timestamp() {
        let body = r#"[
            {"_id":"6450e1a0","eventType":"BG Check","created_at":"2023-05-01T10:00:00.000Z",
             "glucose":148,"glucoseType":"Finger","units":"mg/dl","enteredBy":"xdrip",
             "notes":"Calibration","carbs":null,"insulin":null},
            {"_id":"6450d390","eventType":"Sensor Start","created_at":"2023-05-01T09:00:00Z",
             "enteredBy":"xdrip","carbs":null,"insulin":null}
        ]"#;
        let treatments: Vec<Treatment> = serde_json::from_str(body).unwrap();
        assert_eq!(treatments.len(), 2);
        assert_eq!(treatments[0].event_type.as_deref(), Some("BG Check"));
        assert_eq!(treatments[0].glucose_mgdl(), Some(148.0));
        assert!(treatments[0].is_calibration());
        assert_eq!(treatments[1].event_type.as_deref(), Some(EVENT_SENSOR_START));
        assert_eq!(treatments[1].timestamp().unwrap(), at(T - 60 * MINUTE));
    }

    #[test]
    fn treatment_glucose_accepts_numbers_strings_and_mmol() {
        let t = treatment(r#"{"created_at":"2023-05-01T10:00:00.000Z","glucose":148}"#);
        assert_eq!(t.glucose_mgdl(), Some(148.0));

        let t = treatment(r#"{"created_at":"2023-05-01T10:00:00.000Z","glucose":"90"}"#);
        assert_eq!(t.glucose_mgdl(), Some(90.0));

        let t = treatment(
            r#"{"created_at":"2023-05-01T10:00:00.000Z","glucose":5.5,"units":"mmol"}"#,
        );
        assert_eq!(t.glucose_mgdl(), Some(99.0));

        let t = treatment(r#"{"created_at":"2023-05-01T10:00:00.000Z"}"#);
        assert_eq!(t.glucose_mgdl(), None);
    }

    #[test]
    fn calibration_annotation_is_case_insensitive() {
        let t = treatment(
            r#"{"created_at":"2023-05-01T10:00:00Z","eventType":"BG Check","notes":"Sensor Calibration"}"#,
        );
        assert!(t.is_calibration());

        let t = treatment(r#"{"created_at":"2023-05-01T10:00:00Z","eventType":"BG Check"}"#);
        assert!(!t.is_calibration());
    }

    #[test]
    fn checks_are_rechecked_against_the_range_and_sorted() {
        // The server compares ISO strings, so "...10:00:00Z" passes `$gt "...10:00:00.000Z"`.
        let body = r#"[
            {"created_at":"2023-05-01T10:00:00Z","glucose":100},
            {"created_at":"2023-05-01T10:30:00Z","glucose":"120","notes":"calibration"},
            {"created_at":"2023-05-01T11:00:00Z","glucose":6,"units":"mmol"},
            {"created_at":"2023-05-01T11:15:00Z"}
        ]"#;
        let treatments: Vec<Treatment> = serde_json::from_str(body).unwrap();
        let checks = select_checks(&treatments, TimeRange::unbounded(at(T))).unwrap();

        let got: Vec<(DateTime<Utc>, f64, bool)> = checks
            .iter()
            .map(|c| (c.timestamp, c.glucose, c.is_calibration))
            .collect();
        assert_eq!(
            got,
            vec![(at(T + 60 * MINUTE), 108.0, false), (at(T + 30 * MINUTE), 120.0, true)]
        );
    }

    #[test]
    fn full_responses_are_flagged() {
        assert!(warn_if_truncated("finger checks", CHECK_LIMIT, CHECK_LIMIT));
        assert!(!warn_if_truncated("finger checks", CHECK_LIMIT - 1, CHECK_LIMIT));
    }

    #[test]
    fn zero_unfiltered_is_treated_as_missing() {
        let body = r#"{"date":1682935200000,"sgv":120,"unfiltered":0}"#;
        let e: SgvEntry = serde_json::from_str(body).unwrap();
        assert!(e.raw_entry().is_none());

        let body = r#"{"date":1682935200000,"unfiltered":157412}"#;
        let e: SgvEntry = serde_json::from_str(body).unwrap();
        let entry = e.raw_entry().unwrap();
        assert_eq!(entry.raw, Some(157412.0));
        assert_eq!(entry.timestamp.timestamp_millis(), T);
    }

    #[test]
    fn entry_queries_map_to_find_parameters() {
        let before = EntryQuery::Before {
            before: T,
            count: RAW_PAGE,
        };
        assert_eq!(
            before.params(),
            vec![("find[date][$lt]", T.to_string()), ("count", "12".to_string())]
        );

        let window = EntryQuery::Window {
            after: T,
            through: T + 30 * MINUTE,
            count: 5,
        };
        assert_eq!(window.params()[1], ("find[date][$lte]", (T + 30 * MINUTE).to_string()));
    }

    #[test]
    fn backward_scan_pages_past_entries_without_raw_values() {
        // 13 readings before T; the newest 12 carry no raw value.
        let entries: Vec<SgvEntry> = (1..=13)
            .map(|k| sgv(T - 5 * MINUTE * k, if k == 13 { 140_000.0 } else { 0.0 }))
            .collect();

        let mut log = Vec::new();
        let found = scan_before(at(T), serve(entries, &mut log)).unwrap().unwrap();
        assert_eq!(found.timestamp, at(T - 65 * MINUTE));
        assert_eq!(found.raw, Some(140_000.0));
        assert_eq!(log.len(), 2);
        let second_page = EntryQuery::Before {
            before: T - 60 * MINUTE,
            count: RAW_PAGE,
        };
        assert_eq!(log[1], second_page);
    }

    #[test]
    fn backward_scan_stops_when_history_runs_out() {
        let entries = vec![sgv(T - 5 * MINUTE, 0.0), sgv(T + 5 * MINUTE, 150_000.0)];
        let mut log = Vec::new();
        assert!(scan_before(at(T), serve(entries, &mut log)).unwrap().is_none());
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn forward_windows_are_contiguous_and_capped() {
        let windows = forward_windows(at(T), Duration::minutes(30));
        // 30m, 1h, 2h, 4h, 8h, 16h, 24h
        assert_eq!(windows.len(), 7);

        let mut expected_after = T;
        for w in &windows {
            let EntryQuery::Window { after, through, .. } = *w else {
                panic!("forward scan issued {w:?}");
            };
            assert_eq!(after, expected_after);
            assert!(through > after);
            expected_after = through;
        }
        assert_eq!(expected_after, T + 24 * 60 * MINUTE);
    }

    #[test]
    fn forward_scan_widens_past_the_first_lookahead() {
        let entries = vec![
            sgv(T + 45 * MINUTE, 0.0),
            sgv(T + 50 * MINUTE, 150_000.0),
            sgv(T + 55 * MINUTE, 151_000.0),
        ];
        let mut log = Vec::new();
        let found = scan_after(at(T), Duration::minutes(30), serve(entries, &mut log))
            .unwrap()
            .unwrap();
        assert_eq!(found.timestamp, at(T + 50 * MINUTE));
        assert_eq!(log.len(), 2);

        let mut log = Vec::new();
        let far = vec![sgv(T + 25 * 60 * MINUTE, 150_000.0)];
        let found = scan_after(at(T), Duration::minutes(30), serve(far, &mut log)).unwrap();
        assert!(found.is_none());
        assert_eq!(log.len(), 7);
    }

    #[test]
    fn urls_join_without_double_slashes() {
        let config = NightscoutConfig::new("https://ns.example.org/", None);
        let client = NightscoutClient::new(config).unwrap();
        assert_eq!(client.url(ENTRIES_CAL), "https://ns.example.org/api/v1/entries/cal.json");
        assert!(NightscoutClient::new(NightscoutConfig::new("ns.example.org", None)).is_err());
    }
}
