use crate::{
    cli::shell::{self, ParseError, ShellCommand},
    gly::{
        service::{IdentityService, MemoryIdentityService, RestConfig, RestIdentityService},
        splash::Splash,
        ui::{self, Signal},
        LoginScreen, Navigator, Outcome, Screen,
    },
};
use anyhow::{bail, Context, Result};
use std::{sync::Arc, time::Duration};
use tokio::{
    io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    sync::mpsc::UnboundedReceiver,
};
use tracing::{debug, info};

#[derive(Debug)]
pub enum Backend {
    Offline,
    Rest(RestConfig),
}

#[derive(Debug)]
pub struct Args {
    pub backend: Backend,
    pub splash_delay: Duration,
}

/// Run the splash and login screens on the terminal.
///
/// # Errors
/// Returns an error if the backend cannot be set up or the terminal fails.
pub async fn execute(args: Args) -> Result<()> {
    let shell = match args.backend {
        Backend::Offline => {
            info!("using the in-process identity backend");
            Shell::offline(Arc::new(MemoryIdentityService::new()), args.splash_delay)
        }
        Backend::Rest(config) => {
            info!(
                auth_url = %config.auth_url,
                project = %config.project_id,
                "using the REST identity backend"
            );
            let service =
                RestIdentityService::new(config).context("could not set up the identity backend")?;
            Shell::new(Arc::new(service), args.splash_delay)
        }
    };

    let mut stdout = io::stdout();
    shell.run(BufReader::new(io::stdin()), &mut stdout).await
}

/// Drives the screens from text commands.
pub struct Shell {
    service: Arc<dyn IdentityService>,
    local: Option<Arc<MemoryIdentityService>>,
    splash_delay: Duration,
}

impl Shell {
    #[must_use]
    pub fn new(service: Arc<dyn IdentityService>, splash_delay: Duration) -> Self {
        Self {
            service,
            local: None,
            splash_delay,
        }
    }

    /// Shell over the in-process backend; enables `verify`.
    #[must_use]
    pub fn offline(service: Arc<MemoryIdentityService>, splash_delay: Duration) -> Self {
        Self {
            service: service.clone(),
            local: Some(service),
            splash_delay,
        }
    }

    /// # Errors
    /// Returns an error if reading input or writing output fails.
    pub async fn run<R, W>(self, input: R, out: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (ui, mut signals) = ui::channel();
        let mut navigator = Navigator::new();

        write_line(out, shell::banner(Screen::Splash)).await?;
        let mut splash = Splash::start(self.splash_delay, ui.clone());
        splash.wait().await;
        drop(splash);
        present(&mut signals, &mut navigator, out).await?;
        if navigator.current() != Screen::Login {
            bail!("splash screen did not hand over to the login screen");
        }

        let screen = LoginScreen::new(Arc::clone(&self.service), ui);
        let result = self
            .login(&screen, input, &mut signals, &mut navigator, out)
            .await;

        screen.teardown();
        screen.profiles().settle().await;
        result
    }

    async fn login<R, W>(
        &self,
        screen: &LoginScreen,
        input: R,
        signals: &mut UnboundedReceiver<Signal>,
        navigator: &mut Navigator,
        out: &mut W,
    ) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        if screen.enter().await.is_some() {
            return present(signals, navigator, out).await;
        }

        let mut lines = input.lines();
        loop {
            out.write_all(b"> ").await?;
            out.flush().await?;
            let Some(line) = lines.next_line().await? else {
                debug!("input closed");
                break;
            };

            match line.parse::<ShellCommand>() {
                Ok(ShellCommand::Quit) => break,
                Ok(ShellCommand::Help) => write_line(out, shell::HELP).await?,
                Ok(ShellCommand::Verify { email }) => {
                    let message = self.verify(&email);
                    write_line(out, &message).await?;
                }
                Ok(ShellCommand::SignUp { email, password }) => {
                    finished(&screen.sign_up(&email, &password).await);
                }
                Ok(ShellCommand::SignIn { email, password }) => {
                    finished(&screen.sign_in(&email, &password).await);
                }
                Ok(ShellCommand::Resend) => finished(&screen.resend_verification().await),
                Ok(ShellCommand::Reset { email }) => {
                    finished(&screen.reset_password(&email).await);
                }
                Err(ParseError::Empty) => {}
                Err(err) => write_line(out, &err.to_string()).await?,
            }

            present(signals, navigator, out).await?;
            if navigator.current() == Screen::Content {
                break;
            }
        }
        Ok(())
    }

    fn verify(&self, email: &str) -> String {
        match &self.local {
            Some(local) if local.mark_verified(email.trim()) => {
                format!("{} is now verified, sign in to continue", email.trim())
            }
            Some(_) => format!("No account for {}", email.trim()),
            None => "verify is only available with --offline".to_string(),
        }
    }
}

fn finished(outcome: &Outcome) {
    if outcome.is_failure() {
        debug!(?outcome, "command failed");
    } else {
        debug!(?outcome, "command finished");
    }
}

/// Print queued signals, applying navigation through the transition table.
async fn present<W>(
    signals: &mut UnboundedReceiver<Signal>,
    navigator: &mut Navigator,
    out: &mut W,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Ok(signal) = signals.try_recv() {
        if let Signal::NavigateTo(target) = signal {
            if navigator.navigate_to(target) {
                write_line(out, shell::banner(target)).await?;
            }
            continue;
        }
        if let Some(text) = shell::render(&signal) {
            write_line(out, &text).await?;
        }
    }
    Ok(())
}

async fn write_line<W>(out: &mut W, text: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    out.write_all(text.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await?;
    Ok(())
}
