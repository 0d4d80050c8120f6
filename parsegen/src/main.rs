use std::{
    env,
    fs::File,
    io::{stderr, Read, Write},
    path::{Path, PathBuf},
    process,
};

use getopts::Options;
use log::info;
use lr1grammar::{FirstsKind, Grammar, GrammarError};
use lr1par::{Parser, TableArtifact};
use lr1table::{from_grammar, ReductionKeying};

fn usage(prog: &str, msg: &str) -> ! {
    let path = Path::new(prog);
    let leaf = match path.file_name().and_then(|m| m.to_str()) {
        Some(m) => m,
        None => "parsegen",
    };
    if !msg.is_empty() {
        writeln!(&mut stderr(), "{}", msg).ok();
    }
    writeln!(
        &mut stderr(),
        "Usage: {} [-h] [-q] [-p] [-f <approximate|exact>] [-r <shape|production>] [-i <tokens>] <grammar> [<output>]",
        leaf
    )
    .ok();
    process::exit(1);
}

fn read_file(path: &str) -> String {
    let mut f = match File::open(path) {
        Ok(r) => r,
        Err(e) => {
            writeln!(&mut stderr(), "Can't open file {}: {}", path, e).ok();
            process::exit(1);
        }
    };
    let mut s = String::new();
    if let Err(e) = f.read_to_string(&mut s) {
        writeln!(&mut stderr(), "Can't read file {}: {}", path, e).ok();
        process::exit(1);
    }
    s
}

/// Print each error as `path:line: message` followed by the offending line.
fn report_grammar_errors(path: &str, src: &str, errs: &[GrammarError]) {
    let lines = src.lines().collect::<Vec<_>>();
    for e in errs {
        writeln!(&mut stderr(), "{}:{}: {}", path, e.line, e.kind).ok();
        if let Some(l) = e.line.checked_sub(1).and_then(|i| lines.get(i)) {
            writeln!(&mut stderr(), "    {}", l.trim_end()).ok();
        }
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let prog = &args[0];
    let matches = match Options::new()
        .optflag("h", "help", "")
        .optflag("q", "quiet", "Don't print conflicts")
        .optflag(
            "p",
            "print",
            "Print the grammar, the canonical collection and the tables",
        )
        .optopt(
            "f",
            "firsts",
            "FIRST relation used for lookaheads (default: approximate)",
            "approximate|exact",
        )
        .optopt(
            "r",
            "reductions",
            "How reductions are keyed (default: shape)",
            "shape|production",
        )
        .optopt(
            "i",
            "input",
            "Whitespace separated token names to check against the generated table",
            "TOKENS",
        )
        .parse(&args[1..])
    {
        Ok(m) => m,
        Err(f) => usage(prog, f.to_string().as_str()),
    };

    if matches.opt_present("h") {
        usage(prog, "");
    }

    let quiet = matches.opt_present("q");

    let firsts = match matches.opt_str("f") {
        None => FirstsKind::Approximate,
        Some(s) => match &*s.to_lowercase() {
            "approximate" => FirstsKind::Approximate,
            "exact" => FirstsKind::Exact,
            _ => usage(prog, &format!("Unknown FIRST relation '{}'.", s)),
        },
    };

    let keying = match matches.opt_str("r") {
        None => ReductionKeying::Shape,
        Some(s) => match &*s.to_lowercase() {
            "shape" => ReductionKeying::Shape,
            "production" => ReductionKeying::Production,
            _ => usage(prog, &format!("Unknown reduction keying '{}'.", s)),
        },
    };

    match matches.free.len() {
        0 => usage(prog, "Too few arguments given."),
        1 | 2 => (),
        _ => usage(prog, "Too many arguments given."),
    }

    let grm_path = &matches.free[0];
    let src = read_file(grm_path);
    let grm = match Grammar::new(&src) {
        Ok(x) => x,
        Err(errs) => {
            report_grammar_errors(grm_path, &src, &errs);
            process::exit(1);
        }
    };

    let opts = lr1table::Options::default()
        .firsts(firsts)
        .reductions(keying);
    let (sgraph, stable) = from_grammar(&grm, opts);

    if matches.opt_present("p") {
        println!("Grammar:\n{}", grm.pp());
        println!("Stategraph:\n{}\n", sgraph.pp(&grm));
        println!("Tables:\n{}", stable.pp(&grm));
    }
    if !quiet {
        if let Some(c) = stable.conflicts() {
            print!("{}", c.pp(&grm));
        }
    }

    let out = match matches.free.get(1) {
        Some(p) => PathBuf::from(p),
        None => Path::new(grm_path).with_extension("lr1"),
    };
    let artifact = TableArtifact::new(&grm, stable);
    if let Err(e) = artifact.write(&out) {
        writeln!(&mut stderr(), "{}: {}", out.display(), e).ok();
        process::exit(1);
    }
    info!("Wrote {}", out.display());

    if let Some(input) = matches.opt_str("i") {
        let mut toks = Vec::new();
        for n in input.split_whitespace() {
            match artifact.token_idx(n) {
                Some(tidx) => toks.push(tidx),
                None => {
                    writeln!(&mut stderr(), "Unknown token '{}'.", n).ok();
                    process::exit(1);
                }
            }
        }
        if toks.last() != Some(&artifact.eof_token_idx()) {
            toks.push(artifact.eof_token_idx());
        }
        match Parser::new(artifact.stable()).recognise(&toks) {
            Ok(()) => println!("Valid input"),
            Err(e) => {
                let at = match e.tidx() {
                    Some(tidx) => artifact.token_name(tidx),
                    None => "end of input",
                };
                println!("{} ({})", e, at);
                process::exit(1);
            }
        }
    }
}
