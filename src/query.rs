//! Query commands: parse, execute against a record store, format results.
//!
//! Three commands are supported: `td`/`typedecl` (declaration site of a
//! type), `tn`/`typename` (all matching typenames, `LIKE` wildcards), and
//! `md`/`memberdecl` (a member's declaration site).

use std::io::Write;

use crate::error::{IndexError, Result};
use crate::model::{FileRef, TypeKind, TypeRef};
use crate::store::{RecordStore, TypenameHit};

// ─── Command grammar ─────────────────────────────────────────────────

/// How a `td`/`md` command selects its type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSelector {
    Id(TypeRef),
    Named {
        /// The elaborated keyword, when given. Typename rows do not record
        /// the tag kind, so this does not narrow the search yet.
        /// TODO: filter elaborated lookups by tag kind once typename rows
        /// carry the aggregate kind of their base type.
        kind: Option<TypeKind>,
        name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    TypeDecl(TypeSelector),
    TypeName {
        kind: Option<TypeKind>,
        pattern: String,
    },
    MemberDecl {
        selector: TypeSelector,
        member: String,
    },
}

/// Parse one command string.
pub fn parse_command(input: &str) -> Result<Command> {
    let tokens: Vec<&str> = input.split_whitespace().collect();
    let invalid = |msg: &str| IndexError::InvalidInput(format!("{msg}: '{input}'"));

    let (&cmd, rest) = tokens
        .split_first()
        .ok_or_else(|| invalid("empty command"))?;

    match cmd {
        "td" | "typedecl" => {
            let (selector, rest) = parse_selector(rest).ok_or_else(|| invalid("usage: td ID | td [struct|union|enum] NAME"))?;
            if !rest.is_empty() {
                return Err(invalid("trailing arguments"));
            }
            Ok(Command::TypeDecl(selector))
        }
        "tn" | "typename" => {
            let (kind, rest) = parse_kind(rest);
            match rest {
                [pattern] => Ok(Command::TypeName {
                    kind,
                    pattern: (*pattern).to_string(),
                }),
                _ => Err(invalid("usage: tn [struct|union|enum] NAME")),
            }
        }
        "md" | "memberdecl" => {
            let (selector, rest) = parse_selector(rest)
                .ok_or_else(|| invalid("usage: md (ID | [struct|union|enum] NAME) MEMBER"))?;
            match rest {
                [member] => Ok(Command::MemberDecl {
                    selector,
                    member: (*member).to_string(),
                }),
                _ => Err(invalid("usage: md (ID | [struct|union|enum] NAME) MEMBER")),
            }
        }
        _ => Err(invalid("unknown command")),
    }
}

/// C identifiers cannot start with a digit, so an all-digit token is an id.
fn parse_selector<'a>(tokens: &'a [&'a str]) -> Option<(TypeSelector, &'a [&'a str])> {
    let (&first, rest) = tokens.split_first()?;
    if !first.is_empty() && first.bytes().all(|b| b.is_ascii_digit()) {
        let id: i64 = first.parse().ok()?;
        return Some((TypeSelector::Id(TypeRef(id)), rest));
    }
    let (kind, rest) = parse_kind(tokens);
    let (&name, rest) = rest.split_first()?;
    Some((
        TypeSelector::Named {
            kind,
            name: name.to_string(),
        },
        rest,
    ))
}

fn parse_kind<'a>(tokens: &'a [&'a str]) -> (Option<TypeKind>, &'a [&'a str]) {
    match tokens.split_first() {
        Some((&first, rest)) => match first.parse::<TypeKind>() {
            Ok(kind) => (Some(kind), rest),
            Err(_) => (None, tokens),
        },
        None => (None, tokens),
    }
}

// ─── Execution ───────────────────────────────────────────────────────

/// Parse and run one command, writing all user-visible output to `out`.
/// `NotFound` and `Ambiguous` are reported on `out` and also returned, so
/// the caller can exit nonzero without printing again.
pub fn run_command(store: &mut dyn RecordStore, input: &str, out: &mut dyn Write) -> Result<()> {
    match parse_command(input)? {
        Command::TypeDecl(selector) => {
            let id = resolve_selector(store, &selector, out)?;
            let (entry, loc) = match store.type_lookup(id) {
                Ok(found) => found,
                Err(IndexError::NotFound) => return not_found(out),
                Err(e) => return Err(e),
            };
            let path = path_or_none(store, loc.file);
            writeln!(out, "{} {} at {}:{}:{}", id, entry.kind, path, loc.line, loc.column)?;
            Ok(())
        }
        Command::TypeName { kind: _, pattern } => {
            let hits = collect_typenames(store, &pattern)?;
            if hits.is_empty() {
                return not_found(out);
            }
            for hit in &hits {
                write_typename(store, hit, out)?;
            }
            Ok(())
        }
        Command::MemberDecl { selector, member } => {
            let id = resolve_selector(store, &selector, out)?;
            let (entry, loc) = match store.member_lookup(id, &member) {
                Ok(found) => found,
                Err(IndexError::NotFound) => return not_found(out),
                Err(e) => return Err(e),
            };
            let path = path_or_none(store, loc.file);
            let base = entry.base.map_or(0, |b| b.0);
            writeln!(
                out,
                "{}.'{}', type {}, at {}:{}:{}",
                entry.parent, entry.name, base, path, loc.line, loc.column
            )?;
            Ok(())
        }
    }
}

/// Resolve a selector to one type id. A name matching several distinct ids
/// reports the ambiguity with all candidate typenames.
fn resolve_selector(
    store: &mut dyn RecordStore,
    selector: &TypeSelector,
    out: &mut dyn Write,
) -> Result<TypeRef> {
    let name = match selector {
        TypeSelector::Id(id) => return Ok(*id),
        TypeSelector::Named { name, .. } => name,
    };

    let hits = collect_typenames(store, name)?;
    let mut ids: Vec<TypeRef> = hits.iter().map(|h| h.base).collect();
    ids.sort();
    ids.dedup();

    match ids.as_slice() {
        [] => {
            writeln!(out, "no matching type")?;
            Err(IndexError::NotFound)
        }
        [only] => Ok(*only),
        _ => {
            writeln!(out, "ambiguous typename")?;
            for hit in &hits {
                write_typename(store, hit, out)?;
            }
            Err(IndexError::Ambiguous)
        }
    }
}

/// Drain a typename cursor into owned rows.
fn collect_typenames(store: &mut dyn RecordStore, pattern: &str) -> Result<Vec<TypenameHit>> {
    let mut hits = Vec::new();
    let mut cursor = store.typename_find(pattern)?;
    while cursor.next()? {
        let hit = cursor.peek().expect("next returned true");
        hits.push(hit.clone());
    }
    Ok(hits)
}

fn write_typename(store: &mut dyn RecordStore, hit: &TypenameHit, out: &mut dyn Write) -> Result<()> {
    let path = path_or_none(store, hit.loc.file);
    writeln!(
        out,
        "{} '{}' at {}:{}:{}",
        hit.base, hit.name, path, hit.loc.line, hit.loc.column
    )?;
    Ok(())
}

fn path_or_none(store: &mut dyn RecordStore, file: FileRef) -> String {
    match store.file_lookup(file) {
        Ok(path) => path.display().to_string(),
        Err(_) => "<none>".to_string(),
    }
}

fn not_found(out: &mut dyn Write) -> Result<()> {
    writeln!(out, "no matching type")?;
    Err(IndexError::NotFound)
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
