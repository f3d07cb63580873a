use console::style;
use log::{debug, info};
use sandbox_playground::{
    FileSet, InputTicket, OutputEvent, RunRequest, SessionBuilder, SessionEvent, SessionNotice,
    SessionObserver, SessionUpdate,
};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

/// Exit code when the program finished without raising
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code when the program raised
pub const EXIT_ERROR: i32 = 1;
/// Exit code when the program was stopped by `--timeout`
pub const EXIT_TIMEOUT: i32 = 124;

/// Configuration for one playground run
pub struct RunConfig {
    pub id: Option<String>,
    pub entry: String,
    pub dir: Option<PathBuf>,
    pub snapshot: Option<PathBuf>,
    pub python: Option<PathBuf>,
    pub no_input: bool,
    pub input_buffer: Option<usize>,
    pub timeout: Option<u64>,
    pub load_timeout: u64,
}

enum Incoming {
    Update(SessionUpdate),
    Answer(InputTicket, String),
}

struct Forwarder(Sender<Incoming>);

impl SessionObserver for Forwarder {
    fn on_event(&self, event: SessionEvent) {
        let _ = self.0.send(Incoming::Update(SessionUpdate::Event(event)));
    }

    fn on_notice(&self, notice: SessionNotice) {
        let _ = self.0.send(Incoming::Update(SessionUpdate::Notice(notice)));
    }
}

/// Load the file set named by `--snapshot` or `--dir`
pub fn load_files(config: &RunConfig) -> Result<FileSet, Box<dyn std::error::Error>> {
    if let Some(snapshot) = &config.snapshot {
        debug!("Loading snapshot {:?}", snapshot);
        return Ok(FileSet::from_json(&std::fs::read_to_string(snapshot)?)?);
    }

    let dir = match &config.dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    debug!("Loading files from {:?}", dir);
    Ok(FileSet::from_dir(dir)?)
}

/// Run the entry file and render its events; returns the process exit code
pub fn run_program(config: RunConfig) -> Result<i32, Box<dyn std::error::Error>> {
    let files = load_files(&config)?;
    let request = RunRequest::new(config.entry.as_str(), files)?;
    request.validate()?;

    let session_id = config
        .id
        .clone()
        .unwrap_or_else(|| format!("playground-{}", std::process::id()));

    let (sender, incoming) = mpsc::channel();
    let mut builder = SessionBuilder::new(&session_id)
        .blocking_input(!config.no_input)
        .observer(Forwarder(sender.clone()));

    if let Some(python) = &config.python {
        debug!("Using python: {:?}", python);
        builder = builder.python(python);
    }

    if let Some(bytes) = config.input_buffer {
        debug!("Overriding input buffer: {} bytes", bytes);
        builder = builder.input_buffer_size(bytes);
    }

    info!("Starting session '{}'", session_id);
    let session = builder.build()?;
    session.start()?;

    let load_deadline = Instant::now() + Duration::from_secs(config.load_timeout);
    loop {
        match receive(&incoming, Some(load_deadline))? {
            Some(Incoming::Update(SessionUpdate::Event(SessionEvent {
                event: OutputEvent::Ready,
                ..
            }))) => break,
            Some(Incoming::Update(SessionUpdate::Notice(SessionNotice::LoadFailed { message }))) => {
                return Err(format!("sandbox failed to load: {}", message).into());
            }
            Some(_) => {}
            None => {
                return Err(format!(
                    "sandbox not ready after {}s",
                    config.load_timeout
                )
                .into());
            }
        }
    }

    info!("Running {}", request.entry_path());
    session.run(&request)?;

    let run_deadline = config
        .timeout
        .map(|secs| Instant::now() + Duration::from_secs(secs));

    loop {
        let Some(message) = receive(&incoming, run_deadline)? else {
            info!("Timeout reached, stopping session '{}'", session_id);
            session.stop()?;
            println!();
            println!("{}", style("[stopped]").yellow().bold());
            return Ok(EXIT_TIMEOUT);
        };

        match message {
            Incoming::Answer(ticket, value) => {
                if let Err(e) = session.resolve_input(ticket, &value) {
                    debug!("Dropping late answer: {}", e);
                }
            }
            Incoming::Update(SessionUpdate::Event(event)) => {
                let ticket = event.input_ticket();
                match event.event {
                    OutputEvent::Stdout { text } => {
                        print!("{}", text);
                        io::stdout().flush()?;
                    }
                    OutputEvent::InputRequest { .. } => {
                        if let Some(ticket) = ticket {
                            spawn_prompt_reader(ticket, sender.clone())?;
                        }
                    }
                    OutputEvent::Result { value } => {
                        if let Some(value) = value {
                            println!("{} {}", style("=>").dim(), value);
                        }
                        return Ok(EXIT_SUCCESS);
                    }
                    OutputEvent::Error { message, line } => {
                        eprintln!("{}", style(&message).red());
                        if let Some(line) = line {
                            eprintln!("{}", style(format!("(line {})", line)).red().bold());
                        }
                        return Ok(EXIT_ERROR);
                    }
                    OutputEvent::Ready => {}
                }
            }
            Incoming::Update(SessionUpdate::Notice(notice)) => {
                debug!("Session notice: {:?}", notice);
            }
        }
    }
}

/// `Ok(None)` once `deadline` has passed
fn receive(
    incoming: &mpsc::Receiver<Incoming>,
    deadline: Option<Instant>,
) -> Result<Option<Incoming>, Box<dyn std::error::Error>> {
    let Some(deadline) = deadline else {
        return Ok(Some(incoming.recv()?));
    };

    match incoming.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(message) => Ok(Some(message)),
        Err(RecvTimeoutError::Timeout) => Ok(None),
        Err(RecvTimeoutError::Disconnected) => Err("session closed unexpectedly".into()),
    }
}

/// Read one terminal line off the main loop so `--timeout` keeps ticking
fn spawn_prompt_reader(ticket: InputTicket, answers: Sender<Incoming>) -> io::Result<()> {
    thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            let mut line = String::new();
            if let Err(e) = io::stdin().lock().read_line(&mut line) {
                debug!("stdin unavailable: {}", e);
            }
            let value = line.trim_end_matches(&['\r', '\n'][..]).to_string();
            let _ = answers.send(Incoming::Answer(ticket, value));
        })?;
    Ok(())
}
