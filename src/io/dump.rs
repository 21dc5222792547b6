//! Human-readable lexicon dump, for inspection only.

use std::io::{self, Write};

use crate::lexicon::Lexicon;

/// Write one line per entry in feature order: key, feature, then counts.
///
/// Keys at or beyond the prune cutoff are annotated with ` (pruned)`. The
/// child store, if any, follows under a `Children:` line with each entry's
/// parent count.
pub fn write_lexicon_dump<W: Write>(lexicon: &Lexicon, out: &mut W) -> io::Result<()> {
    let cutoff = lexicon.prune_cutoff();
    for (feature, key, counts) in lexicon.count_table() {
        write!(out, "{key}\t{feature}")?;
        if !counts.is_empty() {
            let counts: Vec<String> = counts.iter().map(u32::to_string).collect();
            write!(out, "\t{}", counts.join(" "))?;
        }
        if cutoff.is_some_and(|c| key >= c) {
            write!(out, " (pruned)")?;
        }
        writeln!(out)?;
    }

    if let Some(children) = lexicon.children() {
        writeln!(out, "Children:")?;
        let mut rows: Vec<_> = children.iter().collect();
        rows.sort_by(|a, b| a.1.cmp(b.1));
        for (key, feature, parents) in rows {
            writeln!(out, "{key}\t{feature}\t{parents}")?;
        }
    }
    Ok(())
}

pub fn lexicon_dump(lexicon: &Lexicon) -> String {
    let mut out = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_lexicon_dump(lexicon, &mut out);
    String::from_utf8_lossy(&out).into_owned()
}
