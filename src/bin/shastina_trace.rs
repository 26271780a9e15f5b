//! Reads a Shastina stream from standard input and writes a human-readable
//! entity trace to standard output (spec.md §6: "command-line surface").

use std::io::{self, Write};
use std::process::ExitCode;

use shastina::{Entity, IoByteSource, Parser, StringKind};

fn kind_name(kind: StringKind) -> &'static str {
    match kind {
        StringKind::Quoted => "quoted",
        StringKind::Curly => "curly",
    }
}

fn trace_one(out: &mut impl Write, entity: &Entity<'_>) -> io::Result<()> {
    match entity {
        Entity::Eof => writeln!(out, "eof"),
        Entity::String { prefix, kind, data } => writeln!(
            out,
            "string {} prefix={:?} data={:?}",
            kind_name(*kind),
            String::from_utf8_lossy(prefix),
            String::from_utf8_lossy(data)
        ),
        Entity::Embedded { prefix } => {
            writeln!(out, "embedded prefix={:?}", String::from_utf8_lossy(prefix))
        }
        Entity::BeginMeta => writeln!(out, "begin-meta"),
        Entity::EndMeta => writeln!(out, "end-meta"),
        Entity::MetaToken { text } => {
            writeln!(out, "meta-token {:?}", String::from_utf8_lossy(text))
        }
        Entity::MetaString { prefix, kind, data } => writeln!(
            out,
            "meta-string {} prefix={:?} data={:?}",
            kind_name(*kind),
            String::from_utf8_lossy(prefix),
            String::from_utf8_lossy(data)
        ),
        Entity::Numeric { text } => writeln!(out, "numeric {:?}", String::from_utf8_lossy(text)),
        Entity::Variable { name } => writeln!(out, "variable {:?}", String::from_utf8_lossy(name)),
        Entity::Constant { name } => writeln!(out, "constant {:?}", String::from_utf8_lossy(name)),
        Entity::Assign { name } => writeln!(out, "assign {:?}", String::from_utf8_lossy(name)),
        Entity::Get { name } => writeln!(out, "get {:?}", String::from_utf8_lossy(name)),
        Entity::BeginGroup => writeln!(out, "begin-group"),
        Entity::EndGroup => writeln!(out, "end-group"),
        Entity::Array { count } => writeln!(out, "array {count}"),
        Entity::Operation { name } => {
            writeln!(out, "operation {:?}", String::from_utf8_lossy(name))
        }
    }
}

fn run() -> Result<(), String> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());

    let mut parser = Parser::new(IoByteSource::new(stdin.lock()));
    loop {
        let entity = parser
            .read()
            .map_err(|e| format!("line {}: {}", e.line, e.kind))?;
        let is_eof = entity == Entity::Eof;
        trace_one(&mut out, &entity).map_err(|e| e.to_string())?;
        if is_eof {
            break;
        }
    }
    out.flush().map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("shastina-trace: {msg}");
            ExitCode::FAILURE
        }
    }
}
