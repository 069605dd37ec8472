//! The target selector.

use std::io;

use hop_core::catalog::{Catalog, TargetDescriptor};

use crate::console::Console;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection<'a> {
    Target(&'a TargetDescriptor),
    Quit,
}

/// The numbered target list, framed by a header rule.
pub fn render(catalog: &Catalog) -> String {
    let rule = "=".repeat(60);
    let mut out = format!("\n{rule}\nAVAILABLE SERVERS\n{rule}\n");
    for (n, target) in catalog.iter().enumerate() {
        out.push_str(&format!("{:2}. {target}\n", n + 1));
    }
    out.push_str(&rule);
    out
}

/// Show the catalog and read choices until one names a target or the
/// operator quits. End of input counts as quitting.
pub async fn choose<'a, C>(catalog: &'a Catalog, console: &mut C) -> io::Result<Selection<'a>>
where
    C: Console + ?Sized,
{
    console.say(&render(catalog));
    let prompt = format!("\nSelect a server (1-{}) or 'q' to quit: ", catalog.len());

    loop {
        let Some(line) = console.read_line(&prompt).await? else {
            return Ok(Selection::Quit);
        };
        match parse_choice(&line, catalog) {
            Ok(selection) => return Ok(selection),
            Err(msg) => console.say(&msg),
        }
    }
}

fn parse_choice<'a>(input: &str, catalog: &'a Catalog) -> Result<Selection<'a>, String> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("q") {
        return Ok(Selection::Quit);
    }

    let n: i64 = input
        .parse()
        .map_err(|_| "Please enter a valid number".to_string())?;

    usize::try_from(n)
        .ok()
        .and_then(|n| catalog.get(n))
        .map(Selection::Target)
        .ok_or_else(|| format!("Please enter a number between 1 and {}", catalog.len()))
}
