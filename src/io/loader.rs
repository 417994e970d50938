use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::{Program, ProgramStore, Word};

use crate::error::ProgramFileError;

/// Reads every program in the file at `path` into `store`.
/// Returns the names of the programs found, in file order.
pub fn load_program_file(path: &Path, store: &mut ProgramStore) -> Result<Vec<String>, ProgramFileError> {
    let file = File::open(path)?;
    parse_programs(BufReader::new(file), store)
}

/// Parses program text of the form
///
/// ```text
/// // PROGRAM init.maq 64
/// 0x0000000A
/// -1
/// // END
/// ```
///
/// The load address is hex. Words are hex when prefixed with `0x`,
/// signed decimal otherwise.
pub fn parse_programs<R: BufRead>(reader: R, store: &mut ProgramStore) -> Result<Vec<String>, ProgramFileError> {
    let mut names = Vec::new();
    let mut current: Option<(String, usize)> = None;
    let mut data = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line_num = idx + 1;
        let line = line?;
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(header) = line.strip_prefix("// PROGRAM") {
            if current.is_some() {
                return Err(parse_error(line_num, "PROGRAM card before END"));
            }
            current = Some(parse_header(line_num, header)?);
        } else if line.starts_with("// END") {
            let (name, load_address) = current
                .take()
                .ok_or_else(|| parse_error(line_num, "END card without PROGRAM"))?;

            store.write_program(Program::new(&name, load_address, std::mem::take(&mut data)));
            names.push(name);
        } else {
            if current.is_none() {
                return Err(parse_error(line_num, "data outside of a PROGRAM block"));
            }
            data.push(parse_word(line_num, line)?);
        }
    }

    if let Some((name, _)) = current {
        return Err(ProgramFileError::Parse {
            line: 0,
            reason: format!("program '{}' is missing its END card", name),
        });
    }

    Ok(names)
}

fn parse_header(line_num: usize, header: &str) -> Result<(String, usize), ProgramFileError> {
    let mut inputs = header.split_whitespace();

    let name = inputs
        .next()
        .ok_or_else(|| parse_error(line_num, "PROGRAM card is missing its name"))?;
    let address = inputs
        .next()
        .ok_or_else(|| parse_error(line_num, "PROGRAM card is missing its load address"))?;
    let address = usize::from_str_radix(address, 16)
        .map_err(|err| parse_error(line_num, &format!("load address is not a hex value: {}", err)))?;

    Ok((name.to_string(), address))
}

fn parse_word(line_num: usize, text: &str) -> Result<Word, ProgramFileError> {
    let parsed = match text.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16).map(|value| value as Word),
        None => text.parse::<Word>(),
    };

    parsed.map_err(|err| parse_error(line_num, &format!("bad word '{}': {}", text, err)))
}

fn parse_error(line: usize, reason: &str) -> ProgramFileError {
    ProgramFileError::Parse {
        line,
        reason: reason.to_string(),
    }
}
