//! Command tokenizer and grammar.
//!
//! Parsing is pure: it turns message text into a typed [`Command`] (or a
//! typed [`ParseError`]) without touching the network, so the grammar is
//! testable independently of execution. Anything whose first token is not
//! a recognized command name is simply not a command.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use thiserror::Error;

use wabridge_models::jid;

/// Report command token.
pub const REPORT_COMMAND: &str = "#laporan";
/// Journal command token.
pub const JOURNAL_COMMAND: &str = "#jurnal";

/// Strict `DD-MM-YYYY` date token.
static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{2})-(\d{2})-(\d{4})$").expect("invalid date regex"));

/// Month names accepted by the report command.
const MONTHS: &[(&str, u32)] = &[
    ("januari", 1),
    ("februari", 2),
    ("maret", 3),
    ("april", 4),
    ("mei", 5),
    ("juni", 6),
    ("juli", 7),
    ("agustus", 8),
    ("september", 9),
    ("oktober", 10),
    ("november", 11),
    ("desember", 12),
];

/// Looks up a month name in the fixed table.
pub fn month_number(name: &str) -> Option<u32> {
    MONTHS
        .iter()
        .find(|(month, _)| *month == name)
        .map(|(_, number)| *number)
}

/// Errors produced by the command grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A token shaped like `DD-MM-YYYY` is not a real calendar date.
    #[error("invalid date token: {0}")]
    InvalidDate(String),
}

/// Recognized command names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandName {
    Report,
    Journal,
}

/// A parsed command invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Report(ReportArgs),
    Journal(JournalArgs),
}

/// Arguments of the report command.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportArgs {
    pub kind: ReportKind,
    pub arg: Option<String>,
}

/// Report type token. Unrecognized types pass through to the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportKind {
    Bulanan,
    Guru,
    Kelas,
    Mapel,
    RekapKehadiran,
    Other(String),
}

impl ReportKind {
    fn from_token(token: &str) -> Self {
        match token {
            "bulanan" => Self::Bulanan,
            "guru" => Self::Guru,
            "kelas" => Self::Kelas,
            "mapel" => Self::Mapel,
            "rekap_kehadiran" => Self::RekapKehadiran,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Bulanan => "bulanan",
            Self::Guru => "guru",
            Self::Kelas => "kelas",
            Self::Mapel => "mapel",
            Self::RekapKehadiran => "rekap_kehadiran",
            Self::Other(other) => other,
        }
    }
}

/// Arguments of the journal command (or a bare image caption).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JournalArgs {
    /// Explicit entry date; defaults to the current date at execution.
    pub date: Option<NaiveDate>,
    pub class: Option<String>,
    pub topic: Option<String>,
}

/// Returns the command name if the first token is a recognized command.
pub fn recognize(text: &str) -> Option<CommandName> {
    let first = text.trim().split_whitespace().next()?.to_lowercase();
    match first.as_str() {
        REPORT_COMMAND => Some(CommandName::Report),
        JOURNAL_COMMAND => Some(CommandName::Journal),
        _ => None,
    }
}

/// Parses message text into a command invocation.
///
/// Returns `Ok(None)` when the text is not a command at all; returns a
/// [`ParseError`] only when a recognized command carries malformed
/// arguments.
pub fn parse(text: &str) -> Result<Option<Command>, ParseError> {
    let Some(name) = recognize(text) else {
        return Ok(None);
    };

    let lower = text.trim().to_lowercase();
    let mut tokens = lower.split_whitespace();
    tokens.next(); // the command token itself

    match name {
        CommandName::Report => {
            let kind = tokens
                .next()
                .map(ReportKind::from_token)
                .unwrap_or(ReportKind::Bulanan);
            let arg = tokens.next().map(str::to_string);
            Ok(Some(Command::Report(ReportArgs { kind, arg })))
        }
        CommandName::Journal => {
            let rest: Vec<&str> = tokens.collect();
            Ok(Some(Command::Journal(parse_journal_fields(&rest)?)))
        }
    }
}

/// Parses `[DD-MM-YYYY] [class] [topic...]` from an image caption.
pub fn parse_caption(caption: &str) -> Result<JournalArgs, ParseError> {
    let lower = caption.trim().to_lowercase();
    let tokens: Vec<&str> = lower.split_whitespace().collect();
    parse_journal_fields(&tokens)
}

/// Shared grammar for journal arguments and captions: an optional
/// leading date token, then a class token, then free-text topic.
fn parse_journal_fields(tokens: &[&str]) -> Result<JournalArgs, ParseError> {
    let mut index = 0;
    let date = match tokens.first() {
        Some(token) if DATE_RE.is_match(token) => {
            index = 1;
            Some(parse_date(token)?)
        }
        _ => None,
    };

    let class = tokens.get(index).map(|s| s.to_string());
    let topic = if tokens.len() > index + 1 {
        Some(tokens[index + 1..].join(" "))
    } else {
        None
    };

    Ok(JournalArgs { date, class, topic })
}

fn parse_date(token: &str) -> Result<NaiveDate, ParseError> {
    let caps = DATE_RE
        .captures(token)
        .ok_or_else(|| ParseError::InvalidDate(token.to_string()))?;
    let day: u32 = caps[1].parse().unwrap_or(0);
    let month: u32 = caps[2].parse().unwrap_or(0);
    let year: i32 = caps[3].parse().unwrap_or(0);
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| ParseError::InvalidDate(token.to_string()))
}

/// A fully resolved report request: API query string and output filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportQuery {
    pub query: String,
    pub filename: String,
}

/// Resolves a report command to its API query string and filename.
///
/// Deterministic in `(kind, arg, today)`; `arg` is the positional
/// argument with any mention fallback already applied by the caller.
pub fn build_report_query(kind: &ReportKind, arg: Option<&str>, today: NaiveDate) -> ReportQuery {
    let year = today.year();
    let month = today.month();

    match kind {
        ReportKind::Bulanan => {
            let m = arg.and_then(month_number).unwrap_or(month);
            ReportQuery {
                query: format!("tipe_laporan=bulanan&tahun={year}&bulan={m}"),
                filename: format!("laporan_bulanan_{m}_{year}.pdf"),
            }
        }
        ReportKind::Guru => {
            let id = arg.map(jid::canonical_user).filter(|id| !id.is_empty());
            match id {
                Some(id) => ReportQuery {
                    query: format!(
                        "tipe_laporan=guru&tahun={year}&no_lid={id}&bulan={month}"
                    ),
                    filename: format!("laporan_guru_{id}_{month}_{year}.pdf"),
                },
                None => ReportQuery {
                    query: format!("tipe_laporan=guru&tahun={year}&id=1&bulan={month}"),
                    filename: format!("laporan_guru_1_{month}_{year}.pdf"),
                },
            }
        }
        ReportKind::Kelas | ReportKind::Mapel => {
            let tipe = kind.as_str();
            let id = arg.unwrap_or("1");
            ReportQuery {
                query: format!("tipe_laporan={tipe}&tahun={year}&id={id}&bulan={month}"),
                filename: format!("laporan_{tipe}_{id}_{month}_{year}.pdf"),
            }
        }
        ReportKind::RekapKehadiran => ReportQuery {
            query: format!("tipe_laporan=rekap_kehadiran&tahun={year}&bulan={month}"),
            filename: format!("rekap_kehadiran_{month}_{year}.pdf"),
        },
        ReportKind::Other(tipe) => ReportQuery {
            query: format!("tipe_laporan={tipe}&tahun={year}"),
            filename: format!("laporan_{tipe}_{year}.pdf"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_not_a_command() {
        assert_eq!(parse("hello everyone").unwrap(), None);
        assert_eq!(parse("").unwrap(), None);
        assert_eq!(parse("#unknown thing").unwrap(), None);
    }

    #[test]
    fn test_command_name_is_case_insensitive() {
        assert_eq!(recognize("#Jurnal 7h"), Some(CommandName::Journal));
        assert_eq!(recognize("  #LAPORAN"), Some(CommandName::Report));
    }

    #[test]
    fn test_journal_with_date_class_topic() {
        let parsed = parse("#jurnal 06-02-2026 7h matematika aljabar")
            .unwrap()
            .unwrap();
        assert_eq!(
            parsed,
            Command::Journal(JournalArgs {
                date: Some(date(2026, 2, 6)),
                class: Some("7h".to_string()),
                topic: Some("matematika aljabar".to_string()),
            })
        );
        // ISO conversion of the leading DD-MM-YYYY token.
        if let Command::Journal(args) = parsed {
            assert_eq!(args.date.unwrap().to_string(), "2026-02-06");
        }
    }

    #[test]
    fn test_journal_without_date() {
        let parsed = parse("#jurnal 7h matematika aljabar").unwrap().unwrap();
        assert_eq!(
            parsed,
            Command::Journal(JournalArgs {
                date: None,
                class: Some("7h".to_string()),
                topic: Some("matematika aljabar".to_string()),
            })
        );
    }

    #[test]
    fn test_caption_parses_like_command_args() {
        let args = parse_caption("7h matematika aljabar").unwrap();
        assert_eq!(args.class.as_deref(), Some("7h"));
        assert_eq!(args.topic.as_deref(), Some("matematika aljabar"));
        assert_eq!(args.date, None);
    }

    #[test]
    fn test_journal_rejects_impossible_date() {
        let err = parse("#jurnal 31-02-2026 7h aljabar").unwrap_err();
        assert_eq!(err, ParseError::InvalidDate("31-02-2026".to_string()));
    }

    #[test]
    fn test_journal_bare_command() {
        let parsed = parse("#jurnal").unwrap().unwrap();
        assert_eq!(parsed, Command::Journal(JournalArgs::default()));
    }

    #[test]
    fn test_report_defaults_to_bulanan() {
        let parsed = parse("#laporan").unwrap().unwrap();
        assert_eq!(
            parsed,
            Command::Report(ReportArgs {
                kind: ReportKind::Bulanan,
                arg: None,
            })
        );
    }

    #[test]
    fn test_month_table() {
        assert_eq!(month_number("januari"), Some(1));
        assert_eq!(month_number("desember"), Some(12));
        assert_eq!(month_number("smarch"), None);
    }

    #[test]
    fn test_bulanan_query_with_month_name() {
        let q = build_report_query(
            &ReportKind::Bulanan,
            Some("maret"),
            date(2026, 8, 8),
        );
        assert_eq!(q.query, "tipe_laporan=bulanan&tahun=2026&bulan=3");
        assert_eq!(q.filename, "laporan_bulanan_3_2026.pdf");
    }

    #[test]
    fn test_bulanan_query_defaults_to_current_month() {
        let q = build_report_query(&ReportKind::Bulanan, None, date(2026, 8, 8));
        assert_eq!(q.query, "tipe_laporan=bulanan&tahun=2026&bulan=8");
        assert_eq!(q.filename, "laporan_bulanan_8_2026.pdf");
    }

    #[test]
    fn test_guru_query_strips_mention_to_digits() {
        let q = build_report_query(
            &ReportKind::Guru,
            Some("12345@lid"),
            date(2026, 8, 8),
        );
        assert_eq!(
            q.query,
            "tipe_laporan=guru&tahun=2026&no_lid=12345&bulan=8"
        );
        assert_eq!(q.filename, "laporan_guru_12345_8_2026.pdf");
    }

    #[test]
    fn test_guru_query_without_id_falls_back() {
        let q = build_report_query(&ReportKind::Guru, None, date(2026, 8, 8));
        assert_eq!(q.query, "tipe_laporan=guru&tahun=2026&id=1&bulan=8");
        assert_eq!(q.filename, "laporan_guru_1_8_2026.pdf");
    }

    #[test]
    fn test_kelas_and_rekap_queries() {
        let kelas = build_report_query(&ReportKind::Kelas, Some("4"), date(2026, 8, 8));
        assert_eq!(kelas.query, "tipe_laporan=kelas&tahun=2026&id=4&bulan=8");
        assert_eq!(kelas.filename, "laporan_kelas_4_8_2026.pdf");

        let rekap = build_report_query(&ReportKind::RekapKehadiran, None, date(2026, 8, 8));
        assert_eq!(rekap.query, "tipe_laporan=rekap_kehadiran&tahun=2026&bulan=8");
        assert_eq!(rekap.filename, "rekap_kehadiran_8_2026.pdf");
    }

    #[test]
    fn test_unknown_report_type_passes_through() {
        let parsed = parse("#laporan tahunan").unwrap().unwrap();
        let Command::Report(args) = parsed else {
            panic!("expected report");
        };
        let q = build_report_query(&args.kind, None, date(2026, 8, 8));
        assert_eq!(q.query, "tipe_laporan=tahunan&tahun=2026");
        assert_eq!(q.filename, "laporan_tahunan_2026.pdf");
    }

    #[test]
    fn test_determinism() {
        let today = date(2026, 2, 6);
        let a = build_report_query(&ReportKind::Guru, Some("99@lid"), today);
        let b = build_report_query(&ReportKind::Guru, Some("99@lid"), today);
        assert_eq!(a, b);
    }
}
