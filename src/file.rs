use failure::Error;

use std::fmt::Debug;
use std::fs::File;
use std::io::prelude::*;
use std::path::Path;

use crate::log;
use crate::values::Value;
use crate::Interpreter;

impl Interpreter {
    /// run a whole file as one program; forms may span lines, and the first
    /// error stops the run
    pub fn run_file<P>(&mut self, path: P) -> Result<Value, Error>
        where P: AsRef<Path> + Debug
    {
        log::info(format!("running {:?}...", path));

        let mut code = String::new();
        File::open(&path)?.read_to_string(&mut code)?;
        let result = self.run(&code)?;

        log::info("run_file: done");
        Ok(result)
    }
}

// }}}
