//! Command line handling shared by the binaries

use clap::Parser;

/// Parse the process arguments, exiting with status 1 on a usage error.
///
/// `--help` and `--version` still exit 0.
pub fn parse<P: Parser>() -> P {
    match P::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = exit_code(&e);
            let _ = e.print();
            std::process::exit(code)
        }
    }
}

/// Exit status for a failed argument parse
pub fn exit_code(err: &clap::Error) -> i32 {
    if err.use_stderr() {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Parser, Debug)]
    #[command(name = "test", version)]
    struct TestCli {
        port: u16,
    }

    #[test]
    fn test_usage_errors_exit_1() {
        let err = TestCli::try_parse_from(["test"]).unwrap_err();
        assert_eq!(exit_code(&err), 1);

        let err = TestCli::try_parse_from(["test", "notaport"]).unwrap_err();
        assert_eq!(exit_code(&err), 1);
    }

    #[test]
    fn test_help_exits_0() {
        let err = TestCli::try_parse_from(["test", "--help"]).unwrap_err();
        assert_eq!(exit_code(&err), 0);

        let err = TestCli::try_parse_from(["test", "--version"]).unwrap_err();
        assert_eq!(exit_code(&err), 0);
    }
}
