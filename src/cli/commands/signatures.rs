//! Signatures command - constructor help for one line.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use crate::config::Settings;
use crate::service::SignatureService;
use crate::signature::Signature;

pub struct SignaturesArgs<'a> {
    pub file: &'a Path,
    pub line: u32,
    pub stdin: bool,
    pub flags: &'a [String],
    pub json: bool,
}

/// Run signatures command. Parse failures are reported, not swallowed.
pub fn run(args: SignaturesArgs<'_>, settings: &Settings) -> Result<()> {
    if !settings.parser.accepts(args.file) {
        tracing::warn!(
            "[cli] {} does not have a configured C++ extension, parsing anyway",
            args.file.display()
        );
    }

    let contents = if args.stdin {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("cannot read buffer from stdin")?;
        Some(buffer)
    } else {
        None
    };

    let mut flags = settings.parser.flags.clone();
    flags.extend(args.flags.iter().cloned());

    let mut service = SignatureService::from_settings(settings)?.with_flags(flags);
    let signatures = service
        .signatures(args.file, contents.as_deref(), args.line)
        .with_context(|| format!("cannot query {}", args.file.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&signatures)?);
    } else {
        print_signatures(args.file, args.line, &signatures);
    }
    Ok(())
}

fn print_signatures(file: &Path, line: u32, signatures: &[Signature]) {
    if signatures.is_empty() {
        println!(
            "{}",
            style(format!(
                "No emplace constructors at {}:{line}",
                file.display()
            ))
            .dim()
        );
        return;
    }

    for (index, signature) in signatures.iter().enumerate() {
        println!("{} {}", style(format!("[{}]", index + 1)).cyan(), signature.label);
        for parameter in &signature.parameters {
            println!("    {}", style(&parameter.text).green());
        }
    }
}
