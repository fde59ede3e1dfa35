//! Reentrant command-table dispatcher
// (c) 2025 Ross Younger

use crate::errors::{Error, ErrorKind, Result};
use crate::record::Field;

/// What the caller should do after dispatching one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdRet {
    /// Proceed to the next line normally
    Continue,
    /// Stop reading the current construct (a record boundary was reached,
    /// or a callback decided the scan is complete)
    Exit,
}

/// Accessor from a target record to one of its tri-state fields.
///
/// Tables are built from plain function pointers rather than field offsets,
/// so one table value serves any number of concurrent dispatches.
pub type FieldOf<T, V> = fn(&mut T) -> &mut Field<V>;

/// A custom command handler
pub type Callback<T> = fn(&mut T, &[&str]) -> Result<CmdRet>;

/// A prefix-command handler; receives the keyword remainder after the
/// matched prefix (e.g. `-timeout` for a `chat` prefix entry seeing
/// `chat-timeout`) and the arguments.
pub type PrefixCallback<T> = fn(&mut T, &str, &[&str]) -> Result<CmdRet>;

/// Typed behaviour of a table entry
pub enum CmdAction<T> {
    /// Store the single argument verbatim
    String(FieldOf<T, String>),
    /// Strictly-parsed 32-bit integer
    Int(FieldOf<T, i32>),
    /// Strictly-parsed 64-bit integer
    Long(FieldOf<T, i64>),
    /// `yes`/`true`/`y`/`t` or `no`/`false`/`n`/`f`, case-insensitive
    Boolean(FieldOf<T, bool>),
    /// Capture all remaining arguments as a new vector. Zero arguments
    /// builds an explicitly empty vector, which is how "disable this"
    /// stays distinguishable from "never configured".
    FullString(FieldOf<T, Vec<String>>),
    /// Invoke a callback with the argument list
    Fn(Callback<T>),
    /// Match the keyword as a prefix and forward the remainder
    Prefix(PrefixCallback<T>),
}

impl<T> std::fmt::Debug for CmdAction<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CmdAction::String(_) => "String",
            CmdAction::Int(_) => "Int",
            CmdAction::Long(_) => "Long",
            CmdAction::Boolean(_) => "Boolean",
            CmdAction::FullString(_) => "FullString",
            CmdAction::Fn(_) => "Fn",
            CmdAction::Prefix(_) => "Prefix",
        };
        f.write_str(name)
    }
}

/// One row of a command table
pub struct CmdEntry<T> {
    keyword: &'static str,
    min_args: usize,
    max_args: Option<usize>,
    action: CmdAction<T>,
}

impl<T> std::fmt::Debug for CmdEntry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmdEntry")
            .field("keyword", &self.keyword)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .field("action", &self.action)
            .finish()
    }
}

impl<T> CmdEntry<T> {
    /// A `String` entry; takes exactly one argument
    pub fn string(keyword: &'static str, field: FieldOf<T, String>) -> Self {
        Self {
            keyword,
            min_args: 1,
            max_args: Some(1),
            action: CmdAction::String(field),
        }
    }

    /// An `Int` entry; takes exactly one argument
    pub fn int(keyword: &'static str, field: FieldOf<T, i32>) -> Self {
        Self {
            keyword,
            min_args: 1,
            max_args: Some(1),
            action: CmdAction::Int(field),
        }
    }

    /// A `Long` entry; takes exactly one argument
    pub fn long(keyword: &'static str, field: FieldOf<T, i64>) -> Self {
        Self {
            keyword,
            min_args: 1,
            max_args: Some(1),
            action: CmdAction::Long(field),
        }
    }

    /// A `Boolean` entry; takes exactly one argument
    pub fn boolean(keyword: &'static str, field: FieldOf<T, bool>) -> Self {
        Self {
            keyword,
            min_args: 1,
            max_args: Some(1),
            action: CmdAction::Boolean(field),
        }
    }

    /// A `FullString` entry; takes any number of arguments, including none
    pub fn full_string(keyword: &'static str, field: FieldOf<T, Vec<String>>) -> Self {
        Self {
            keyword,
            min_args: 0,
            max_args: None,
            action: CmdAction::FullString(field),
        }
    }

    /// A callback entry with an explicit argument-count constraint
    pub fn callback(
        keyword: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        cb: Callback<T>,
    ) -> Self {
        Self {
            keyword,
            min_args,
            max_args,
            action: CmdAction::Fn(cb),
        }
    }

    /// A prefix entry with an explicit argument-count constraint
    pub fn prefix(
        keyword: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        cb: PrefixCallback<T>,
    ) -> Self {
        Self {
            keyword,
            min_args,
            max_args,
            action: CmdAction::Prefix(cb),
        }
    }

    fn expected(&self) -> String {
        match (self.min_args, self.max_args) {
            (n, Some(m)) if n == m => format!("exactly {n}"),
            (n, Some(m)) => format!("between {n} and {m}"),
            (n, None) => format!("at least {n}"),
        }
    }
}

/// An ordered keyword table bound to a target type.
///
/// The dispatcher itself is stateless between calls; all state lives in the
/// caller-supplied target.
#[derive(Debug)]
pub struct CmdTable<T> {
    entries: Vec<CmdEntry<T>>,
    case_sensitive: bool,
}

fn first_byte_matches(a: u8, b: u8, case_sensitive: bool) -> bool {
    if case_sensitive {
        a == b
    } else {
        a.eq_ignore_ascii_case(&b)
    }
}

/// Parses the fixed set of boolean spellings.
pub(crate) fn parse_bool(word: &str) -> Result<bool> {
    if word.eq_ignore_ascii_case("yes")
        || word.eq_ignore_ascii_case("true")
        || word.eq_ignore_ascii_case("y")
        || word.eq_ignore_ascii_case("t")
    {
        Ok(true)
    } else if word.eq_ignore_ascii_case("no")
        || word.eq_ignore_ascii_case("false")
        || word.eq_ignore_ascii_case("n")
        || word.eq_ignore_ascii_case("f")
    {
        Ok(false)
    } else {
        Err(ErrorKind::BadBoolean(word.to_string()).into())
    }
}

impl<T> CmdTable<T> {
    /// Constructor. Keyword matching is case-insensitive unless
    /// [`case_sensitive`](Self::case_sensitive) is applied.
    #[must_use]
    pub fn new(entries: Vec<CmdEntry<T>>) -> Self {
        Self {
            entries,
            case_sensitive: false,
        }
    }

    /// Switches the table to exact-case keyword matching
    #[must_use]
    pub fn case_sensitive(mut self) -> Self {
        self.case_sensitive = true;
        self
    }

    fn keyword_matches<'line>(
        &self,
        entry: &CmdEntry<T>,
        word: &'line str,
    ) -> Option<&'line str> {
        match entry.action {
            CmdAction::Prefix(_) => {
                if word.len() >= entry.keyword.len() && word.is_char_boundary(entry.keyword.len())
                {
                    let (head, rest) = word.split_at(entry.keyword.len());
                    let hit = if self.case_sensitive {
                        head == entry.keyword
                    } else {
                        head.eq_ignore_ascii_case(entry.keyword)
                    };
                    if hit {
                        return Some(rest);
                    }
                }
                None
            }
            _ => {
                let hit = if self.case_sensitive {
                    word == entry.keyword
                } else {
                    word.eq_ignore_ascii_case(entry.keyword)
                };
                if hit {
                    Some("")
                } else {
                    None
                }
            }
        }
    }

    /// Looks up `tokens[0]` in the table and applies the matching entry to
    /// `target`. Unknown keywords are routed to `unknown` if supplied, and
    /// silently skipped otherwise. Argument counts are enforced before any
    /// setter or callback runs.
    pub fn dispatch(
        &self,
        target: &mut T,
        tokens: &[&str],
        unknown: Option<Callback<T>>,
    ) -> Result<CmdRet> {
        let Some(&word) = tokens.first() else {
            return Ok(CmdRet::Continue);
        };
        if word.is_empty() {
            return Ok(CmdRet::Continue);
        }
        let args = &tokens[1..];
        let first = word.as_bytes()[0];

        for entry in &self.entries {
            // cheap prefilter before the full comparison
            if !first_byte_matches(entry.keyword.as_bytes()[0], first, self.case_sensitive) {
                continue;
            }
            let Some(rest) = self.keyword_matches(entry, word) else {
                continue;
            };

            let got = args.len();
            if got < entry.min_args || entry.max_args.is_some_and(|m| got > m) {
                return Err(Error::from(ErrorKind::BadArgCount {
                    keyword: word.to_string(),
                    expected: entry.expected(),
                    got,
                }));
            }

            return match entry.action {
                CmdAction::String(field) => {
                    *field(target) = Field::Set(args[0].to_string());
                    Ok(CmdRet::Continue)
                }
                CmdAction::Int(field) => {
                    let n: i32 = args[0]
                        .parse()
                        .map_err(|_| ErrorKind::BadNumber(args[0].to_string()))?;
                    *field(target) = Field::Set(n);
                    Ok(CmdRet::Continue)
                }
                CmdAction::Long(field) => {
                    let n: i64 = args[0]
                        .parse()
                        .map_err(|_| ErrorKind::BadNumber(args[0].to_string()))?;
                    *field(target) = Field::Set(n);
                    Ok(CmdRet::Continue)
                }
                CmdAction::Boolean(field) => {
                    *field(target) = Field::Set(parse_bool(args[0])?);
                    Ok(CmdRet::Continue)
                }
                CmdAction::FullString(field) => {
                    *field(target) =
                        Field::Set(args.iter().map(ToString::to_string).collect());
                    Ok(CmdRet::Continue)
                }
                CmdAction::Fn(cb) => cb(target, args),
                CmdAction::Prefix(cb) => cb(target, rest, args),
            };
        }

        match unknown {
            Some(cb) => cb(target, tokens),
            None => Ok(CmdRet::Continue),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{CmdEntry, CmdRet, CmdTable};
    use crate::errors::ErrorKind;
    use crate::record::Field;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Default)]
    struct Target {
        name: Field<String>,
        count: Field<i32>,
        size: Field<i64>,
        flag: Field<bool>,
        list: Field<Vec<String>>,
        seen_rest: Option<String>,
        callback_ran: bool,
    }

    fn table() -> CmdTable<Target> {
        CmdTable::new(vec![
            CmdEntry::string("name", |t| &mut t.name),
            CmdEntry::int("count", |t| &mut t.count),
            CmdEntry::long("size", |t| &mut t.size),
            CmdEntry::boolean("flag", |t| &mut t.flag),
            CmdEntry::full_string("list", |t| &mut t.list),
            CmdEntry::callback("stop", 0, Some(0), |t, _| {
                t.callback_ran = true;
                Ok(CmdRet::Exit)
            }),
            CmdEntry::prefix("chat", 0, None, |t, rest, args| {
                t.seen_rest = Some(format!("{rest}/{n}", n = args.len()));
                Ok(CmdRet::Continue)
            }),
        ])
    }

    #[test]
    fn typed_setters() {
        let mut t = Target::default();
        let tab = table();
        assert_eq!(
            tab.dispatch(&mut t, &["Name", "foo"], None).unwrap(),
            CmdRet::Continue
        );
        assert_eq!(tab.dispatch(&mut t, &["count", "-3"], None).unwrap(), CmdRet::Continue);
        assert_eq!(tab.dispatch(&mut t, &["size", "123456789012"], None).unwrap(), CmdRet::Continue);
        assert_eq!(tab.dispatch(&mut t, &["flag", "Yes"], None).unwrap(), CmdRet::Continue);
        assert_eq!(t.name, Field::Set("foo".to_string()));
        assert_eq!(t.count, Field::Set(-3));
        assert_eq!(t.size, Field::Set(123_456_789_012));
        assert_eq!(t.flag, Field::Set(true));
    }

    #[test]
    fn argument_count_enforced_before_setter() {
        // An entry requiring exactly one argument, given two, errors out
        // without touching the field.
        let mut t = Target::default();
        let err = table()
            .dispatch(&mut t, &["name", "a", "b"], None)
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::BadArgCount { .. }));
        assert_eq!(t.name, Field::Unset);
    }

    #[test]
    fn strict_numeric_validation() {
        let mut t = Target::default();
        let err = table().dispatch(&mut t, &["count", "12x"], None).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::BadNumber(_)));
        assert_eq!(t.count, Field::Unset);
    }

    #[test]
    fn boolean_spellings() {
        for (word, expected) in [
            ("yes", true),
            ("TRUE", true),
            ("t", true),
            ("no", false),
            ("False", false),
            ("N", false),
        ] {
            let mut t = Target::default();
            table().dispatch(&mut t, &["flag", word], None).unwrap();
            assert_eq!(t.flag, Field::Set(expected), "spelling {word}");
        }
        let mut t = Target::default();
        let err = table().dispatch(&mut t, &["flag", "wombat"], None).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::BadBoolean(_)));
    }

    #[test]
    fn full_string_empty_is_explicit() {
        let mut t = Target::default();
        table().dispatch(&mut t, &["list"], None).unwrap();
        // explicitly empty, not unset
        assert_eq!(t.list, Field::Set(vec![]));

        table().dispatch(&mut t, &["list", "a", "b"], None).unwrap();
        assert_eq!(t.list, Field::Set(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn prefix_forwards_remainder() {
        let mut t = Target::default();
        table()
            .dispatch(&mut t, &["Chat-Timeout", "10"], None)
            .unwrap();
        assert_eq!(t.seen_rest.as_deref(), Some("-Timeout/1"));

        table().dispatch(&mut t, &["chat", "a", "b"], None).unwrap();
        assert_eq!(t.seen_rest.as_deref(), Some("/2"));
    }

    #[test]
    fn callback_exit() {
        let mut t = Target::default();
        assert_eq!(table().dispatch(&mut t, &["stop"], None).unwrap(), CmdRet::Exit);
        assert!(t.callback_ran);
    }

    #[test]
    fn unknown_keywords_skip_or_route() {
        let mut t = Target::default();
        // no fallback: silently skipped
        assert_eq!(
            table().dispatch(&mut t, &["future-keyword", "x"], None).unwrap(),
            CmdRet::Continue
        );
        // fallback sees the whole token list
        let ret = table()
            .dispatch(
                &mut t,
                &["future-keyword", "x"],
                Some(|t, tokens| {
                    t.callback_ran = tokens == ["future-keyword", "x"].as_slice();
                    Ok(CmdRet::Continue)
                }),
            )
            .unwrap();
        assert_eq!(ret, CmdRet::Continue);
        assert!(t.callback_ran);
    }

    #[test]
    fn case_sensitive_mode() {
        let mut t = Target::default();
        let tab = table().case_sensitive();
        tab.dispatch(&mut t, &["Name", "foo"], None).unwrap();
        assert_eq!(t.name, Field::Unset);
        tab.dispatch(&mut t, &["name", "foo"], None).unwrap();
        assert_eq!(t.name, Field::Set("foo".to_string()));
    }

    #[test]
    fn empty_line_is_a_no_op() {
        let mut t = Target::default();
        assert_eq!(table().dispatch(&mut t, &[], None).unwrap(), CmdRet::Continue);
    }
}
