//! Expansion of the scheduler's compact hostlist notation (e.g.
//! `vm-[01-03,07],gpu-1`) into an explicit, order-preserving list of host
//! names.

use nom::branch::alt;
use nom::bytes::complete::is_not;
use nom::character::complete::{char, digit1};
use nom::combinator::{map, map_res, opt};
use nom::multi::{many1, separated_list1};
use nom::sequence::{delimited, pair, preceded};

use crate::common::parser::{NomResult, consume_all};

/// One section of a host name: literal text, or the set of numeric
/// alternatives produced by a bracket expression.
enum Segment {
    Literal(String),
    Alternatives(Vec<String>),
}

fn expand_range(start: &str, end: Option<&str>) -> anyhow::Result<Vec<String>> {
    let Some(end) = end else {
        return Ok(vec![start.to_string()]);
    };
    let from: u64 = start.parse()?;
    let to: u64 = end.parse()?;
    if to < from {
        anyhow::bail!("Invalid range {start}-{end}");
    }
    // Zero padding of the range start is kept for all expanded values.
    let width = if start.starts_with('0') { start.len() } else { 0 };
    Ok((from..=to).map(|value| format!("{value:0width$}")).collect())
}

/// Parse a number or an inclusive number range (`5` or `01-10`).
fn p_range(input: &str) -> NomResult<Vec<String>> {
    map_res(
        pair(digit1, opt(preceded(char('-'), digit1))),
        |(start, end)| expand_range(start, end),
    )(input)
}

fn p_bracket(input: &str) -> NomResult<Vec<String>> {
    map(
        delimited(char('['), separated_list1(char(','), p_range), char(']')),
        |ranges| ranges.into_iter().flatten().collect(),
    )(input)
}

fn p_segment(input: &str) -> NomResult<Segment> {
    alt((
        map(p_bracket, Segment::Alternatives),
        map(is_not(",[]"), |text: &str| {
            Segment::Literal(text.to_string())
        }),
    ))(input)
}

/// Expand the segments of a single name into the cartesian product of their
/// alternatives, rightmost segment varying fastest.
fn expand_segments(segments: Vec<Segment>) -> Vec<String> {
    let mut hosts = vec![String::new()];
    for segment in segments {
        match segment {
            Segment::Literal(text) => {
                for host in &mut hosts {
                    host.push_str(&text);
                }
            }
            Segment::Alternatives(alternatives) => {
                hosts = hosts
                    .iter()
                    .flat_map(|prefix| {
                        alternatives
                            .iter()
                            .map(move |suffix| format!("{prefix}{suffix}"))
                    })
                    .collect();
            }
        }
    }
    hosts
}

fn p_name(input: &str) -> NomResult<Vec<String>> {
    map(many1(p_segment), expand_segments)(input)
}

fn p_hostlist(input: &str) -> NomResult<Vec<String>> {
    map(separated_list1(char(','), p_name), |names| {
        names.into_iter().flatten().collect()
    })(input)
}

/// Expand compact hostlist notation into an explicit host list.
///
/// The expansion preserves the order of the input and the zero padding of
/// range starts: `vm-[08-10]` becomes `vm-08`, `vm-09`, `vm-10`.
pub fn expand_hostlist(hostlist: &str) -> anyhow::Result<Vec<String>> {
    consume_all(p_hostlist, hostlist.trim())
}
