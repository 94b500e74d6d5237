//! `@file` argument expansion.
//!
//! Every argument of the form `@path` is replaced by the tokens of each line of `path`,
//! split with shell quoting rules. Files may reference further files.

use crate::error::ConfigError;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Nesting limit; deeper chains are almost certainly a file including itself.
const MAX_DEPTH: usize = 16;

/// Expand every `@file` argument in place. The first argument (program name) is kept as is.
pub fn expand_args<I>(args: I) -> Result<Vec<String>, ConfigError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut expanded: Vec<String> = args.next().into_iter().collect();
    for arg in args {
        expand_one(arg, 0, &mut expanded)?;
    }
    Ok(expanded)
}

/// Convert raw process arguments, rejecting any that are not UTF-8.
pub fn utf8_args<I>(args: I) -> Result<Vec<String>, ConfigError>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .enumerate()
        .map(|(position, arg)| {
            arg.into_string().map_err(|raw| ConfigError::NonUtf8Argument {
                position,
                lossy: raw.to_string_lossy().into_owned(),
            })
        })
        .collect()
}

fn expand_one(arg: String, depth: usize, out: &mut Vec<String>) -> Result<(), ConfigError> {
    let Some(path) = arg.strip_prefix('@').filter(|p| !p.is_empty()) else {
        out.push(arg);
        return Ok(());
    };
    let path = PathBuf::from(path);
    if depth >= MAX_DEPTH {
        return Err(ConfigError::ArgFile {
            path,
            reason: format!("argument files nested more than {} levels deep", MAX_DEPTH),
        });
    }

    for token in read_tokens(&path)? {
        expand_one(token, depth + 1, out)?;
    }
    Ok(())
}

/// Tokens of every line of the file, in order.
pub fn read_tokens(path: &Path) -> Result<Vec<String>, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::ArgFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut tokens = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        let words = shlex::split(line).ok_or_else(|| ConfigError::ArgFile {
            path: path.to_path_buf(),
            reason: format!("line {} has unbalanced quoting", index + 1),
        })?;
        tokens.extend(words);
    }
    Ok(tokens)
}
