use anyhow::{Result, bail};
use std::io::{self, BufRead, IsTerminal};
use zeroize::Zeroizing;

pub const PASSWORD_ENV: &str = "UNVAULT_PASSWORD";

pub fn read_password() -> Result<Zeroizing<String>> {
    //  Environment Variable
    //  UNVAULT_PASSWORD="hunter2" unvault --vault aegis.json decrypt
    if let Ok(pw) = std::env::var(PASSWORD_ENV) {
        let pw = Zeroizing::new(pw);
        if !pw.is_empty() {
            return Ok(pw);
        }
    }

    //  stdin (Pipeline)
    //  pass show aegis | unvault --vault aegis.json decrypt
    if !io::stdin().is_terminal() {
        let mut buf = Zeroizing::new(String::new());
        io::stdin().lock().read_line(&mut buf)?;
        trim_newline(&mut buf);

        if !buf.is_empty() {
            return Ok(buf);
        }
    }

    //  Interactive (TTY)
    if io::stdin().is_terminal() {
        let pw = Zeroizing::new(rpassword::prompt_password("Vault password: ")?);
        if !pw.is_empty() {
            return Ok(pw);
        }
    }

    bail!("No password provided")
}

fn trim_newline(s: &mut String) {
    while s.ends_with('\n') || s.ends_with('\r') {
        s.pop();
    }
}
