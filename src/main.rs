use itertools::join;
use std::path::PathBuf;
use std::process;

use ish::{log, Config, Interpreter, MultiFunctionPolicy};
use rustyline::Editor;
use rustyline::error::ReadlineError;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
struct Opt {
    #[structopt(short = "d", long = "debug")]
    debug: bool,

    #[structopt(long = "strict-multi", help = "only a rejected pattern moves a multi-function on to its next alternative")]
    strict_multi: bool,

    #[structopt(long = "max-depth", default_value = "512", help = "how deeply evaluation may nest")]
    max_depth: usize,

    #[structopt(short = "e", long = "eval", help = "evaluate CODE, print the result and exit")]
    eval: Option<String>,

    #[structopt(name = "INITFILE", parse(from_os_str), help = "ish file to run on startup")]
    initfile: Option<PathBuf>,
}

const HISTFILE: &str = ".ish_hist";

const HELP: &str = "\
>env   list the names bound at the top level
>help  show this message
ctrl-d quits";

fn main() {
    let opt = Opt::from_args();
    log::set_debug(opt.debug);
    log::debug(format!("set options: {:?}", opt));

    let config = Config {
        max_depth: opt.max_depth,
        multi_function: if opt.strict_multi {
            MultiFunctionPolicy::PatternOnly
        } else {
            MultiFunctionPolicy::CatchAll
        },
    };
    let mut interpreter = Interpreter::with_config(config);

    if let Some(initfile) = &opt.initfile {
        if let Err(why) = interpreter.run_file(initfile) {
            log::warn(why);
        }
    }

    if let Some(code) = &opt.eval {
        match interpreter.run(code) {
            Ok(result) => println!("{}", result),
            Err(err) => {
                log::error(err);
                process::exit(1);
            }
        }
        return;
    }

    let mut rl = Editor::<()>::new();
    if let Err(err) = rl.load_history(HISTFILE) {
        log::warn(format!("error opening history file: {}", err));
    }

    let prompt = format!("{}ish λ{} ", "\x1b[1;94m", log::RESET);

    loop {
        let input = rl.readline(&prompt);

        match input {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                if line.starts_with('>') && line.len() > 1 {
                    println!("{}", command(&interpreter, line[1..].trim()));
                } else {
                    rl.add_history_entry(line.as_str());
                    match interpreter.run(&line) {
                        Ok(result) => println!("{}", result),
                        Err(err) => log::error(err),
                    }
                }
            }

            Err(ReadlineError::Interrupted) => {
                println!("^C");
            }

            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }

            Err(err) => {
                log::error(err);
                break;
            }
        }
    }

    if let Err(err) = rl.save_history(HISTFILE) {
        log::warn(format!("error saving history file: {}", err));
    }
}

fn command(interpreter: &Interpreter, cmd: &str) -> String {
    match cmd {
        "env" => join(interpreter.scopes().identifiers(interpreter.root()), ", "),
        "help" => HELP.to_owned(),
        _ => "invalid command".to_owned(),
    }
}
