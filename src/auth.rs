use anyhow::{Result, bail};
use std::io::{self, BufRead, IsTerminal};
use zeroize::Zeroizing;

/// Master password, looked up in order:
/// `PWSAFE_PASSWORD`, one line on a piped stdin, then an interactive prompt.
pub fn read_password() -> Result<Zeroizing<String>> {
    if let Ok(pw) = std::env::var("PWSAFE_PASSWORD") {
        if !pw.is_empty() {
            return Ok(Zeroizing::new(pw));
        }
    }

    // printf '%s\n' "$pw" | pwsafe3 --db vault.psafe3 list
    if !io::stdin().is_terminal() {
        let pw = read_line(&mut io::stdin().lock())?;
        if !pw.is_empty() {
            return Ok(pw);
        }
    } else {
        let pw = Zeroizing::new(rpassword::prompt_password("Password: ")?);
        if !pw.is_empty() {
            return Ok(pw);
        }
    }

    bail!("no password provided")
}

/// New master password, typed twice. Piped stdin supplies both lines.
pub fn read_new_password_with_confirmation() -> Result<Zeroizing<String>> {
    let (first, second) = if io::stdin().is_terminal() {
        (
            Zeroizing::new(rpassword::prompt_password("New password: ")?),
            Zeroizing::new(rpassword::prompt_password("Confirm password: ")?),
        )
    } else {
        let mut handle = io::stdin().lock();
        (read_line(&mut handle)?, read_line(&mut handle)?)
    };
    confirm(first, &second)
}

fn confirm(first: Zeroizing<String>, second: &str) -> Result<Zeroizing<String>> {
    if first.is_empty() {
        bail!("password cannot be empty");
    }
    if first.as_str() != second {
        bail!("passwords do not match");
    }
    Ok(first)
}

fn read_line(reader: &mut impl BufRead) -> Result<Zeroizing<String>> {
    let mut line = Zeroizing::new(String::new());
    reader.read_line(&mut line)?;
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}
