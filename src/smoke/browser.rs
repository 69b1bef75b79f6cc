//! Scripted browser session against a freshly started executable.

use std::net::TcpListener;
use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64::Engine;
use regex::Regex;
use reqwest::blocking::Client;

use super::frame::{self, Frame, REQUESTED_HEIGHT, REQUESTED_WIDTH};
use super::launch::{launch, LaunchOptions};
use super::{log, Mode};
use crate::config::SmokeConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const EXIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Attempt ceiling and fixed sleep of a polling loop.
#[derive(Debug, Clone, Copy)]
pub struct Polling {
    pub attempts: u32,
    pub sleep: Duration,
}

pub const STARTUP_POLLING: Polling = Polling {
    attempts: 20,
    sleep: Duration::from_secs(5),
};
pub const FRAME_POLLING: Polling = Polling {
    attempts: 30,
    sleep: Duration::from_secs(2),
};

/// Redirect pages the server walks a new client through, in order.
pub const FORWARD_PATTERNS: [&str; 4] = [
    r#"window\.location\.href = "(/[0-9+]/[a-zA-Z0-9]+/prev/)""#,
    r#"window\.location\.href = ."(/[0-9]+/[a-zA-Z0-9]+/).""#,
    r#"window\.location\.href = ."(/[0-9]+/[a-zA-Z0-9]+/next/).""#,
    r#"window\.location\.href = ..."(/[0-9]+/[a-zA-Z0-9]+/)...""#,
];
pub const IMAGE_PATH_PATTERN: &str = r#"var imgPath =\s+"(/[0-9]+/[a-zA-Z0-9]+/image/)""#;

/// Base64 payload that fills the page with text.
fn text_page_url() -> String {
    format!("data:text/plain;charset=utf-8;base64,{}", "QUFB".repeat(1000))
}

fn test_image_data_url() -> Result<String> {
    let png = frame::test_image_png()?;
    Ok(format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png)
    ))
}

/// First capture group of `pattern` in `html`.
pub fn extract_path(html: &str, pattern: &str) -> Result<String> {
    let re = Regex::new(pattern).with_context(|| format!("compiling pattern {pattern:?}"))?;
    match re.captures(html).and_then(|c| c.get(1)) {
        Some(m) => Ok(m.as_str().to_string()),
        None => bail!("Parsing failed: no match for {pattern:?}"),
    }
}

/// Bind port 0 on loopback and return the port the OS picked.
pub fn free_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("binding a free loopback port")?;
    Ok(listener.local_addr()?.port())
}

struct Session {
    client: Client,
    prefix: String,
    html: String,
    img_prefix: String,
    img_idx: u32,
}

impl Session {
    fn get_ok(&self, url: &str) -> Result<reqwest::blocking::Response> {
        let resp = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("requesting {url}"))?;
        if resp.status() != reqwest::StatusCode::OK {
            bail!("Response status {} != 200", resp.status());
        }
        Ok(resp)
    }

    fn wait_for_server(&mut self) -> Result<()> {
        let url = format!("{}/", self.prefix);
        log(format!("Sending HTTP requests to {url} until it responds"));
        for attempt in 1..=STARTUP_POLLING.attempts {
            log(format!("Sending request #{attempt}"));
            match self.client.get(&url).send() {
                Ok(resp) if resp.status() == reqwest::StatusCode::OK => {
                    log("Got 200 response");
                    self.html = resp.text().context("reading response body")?;
                    return Ok(());
                }
                Ok(resp) => log(format!("Got response status {}", resp.status())),
                Err(_) => log("Request failed"),
            }
            if attempt < STARTUP_POLLING.attempts {
                log(format!("Sleeping {}s and retrying", STARTUP_POLLING.sleep.as_secs()));
                thread::sleep(STARTUP_POLLING.sleep);
            }
        }
        bail!("Browservice did not respond to HTTP requests, attempt count limit exhausted")
    }

    fn forward(&mut self, pattern: &str) -> Result<()> {
        log(format!(
            "Parsing continuation address from response HTML {:?}",
            self.html
        ));
        let url = format!("{}{}", self.prefix, extract_path(&self.html, pattern)?);
        log(format!("Requesting {url}"));
        self.html = self
            .get_ok(&url)?
            .text()
            .context("reading response body")?;
        Ok(())
    }

    fn fetch_frame(&mut self) -> Result<Frame> {
        self.img_idx += 1;
        let url = format!(
            "{}1/{}/1/{}/{}/0/",
            self.img_prefix, self.img_idx, REQUESTED_WIDTH, REQUESTED_HEIGHT
        );
        log(format!("Requesting image from {url}"));
        let bytes = self.get_ok(&url)?.bytes().context("reading image body")?;
        log(format!("Loading image data of {} bytes", bytes.len()));
        let frame = Frame::decode(&bytes)?;
        log(format!("Image with shape {:?} loaded successfully", frame.shape()));
        Ok(frame)
    }

    fn wait_for_shape(&mut self) -> Result<()> {
        log("Waiting for the image to be of the correct shape");
        for attempt in 1..=FRAME_POLLING.attempts {
            log(format!("Requesting image #{attempt}"));
            let frame = self.fetch_frame()?;
            if frame.has_expected_shape() {
                log(format!("Image of correct shape {:?} received", frame.shape()));
                return Ok(());
            }
            if attempt < FRAME_POLLING.attempts {
                log(format!("Sleeping {}s and retrying", FRAME_POLLING.sleep.as_secs()));
                thread::sleep(FRAME_POLLING.sleep);
            }
        }
        bail!("Image shape did not become correct, attempt count limit exhausted")
    }

    fn wait_for(&mut self, criterion: impl Fn(&Frame) -> bool) -> Result<()> {
        for attempt in 1..=FRAME_POLLING.attempts {
            log(format!("Requesting image #{attempt}"));
            let frame = self.fetch_frame()?;
            if !frame.has_expected_shape() {
                bail!("Fetched image has incorrect shape {:?}", frame.shape());
            }
            if criterion(&frame) {
                return Ok(());
            }
            if attempt < FRAME_POLLING.attempts {
                log(format!("Sleeping {}s and retrying", FRAME_POLLING.sleep.as_secs()));
                thread::sleep(FRAME_POLLING.sleep);
            }
        }
        bail!("Image did not fulfill criterion, attempt count limit exhausted")
    }

    fn goto(&self, target: &str) -> Result<()> {
        let base = self.img_prefix.strip_suffix("image/").unwrap_or(&self.img_prefix);
        self.get_ok(&format!("{base}goto/{target}"))?;
        Ok(())
    }
}

/// Drive a browser session and require a clean exit on Ctrl+C.
pub fn browser_test(exe: &Path, mode: Mode, config: &SmokeConfig) -> Result<()> {
    log("Running browser test");

    log("Finding free port to listen on");
    let port = free_port()?;
    log(format!("Using port {port}"));
    browser_session(exe, port, mode, config)
}

/// Launch `exe` listening on `port`, walk the session and interrupt it.
fn browser_session(exe: &Path, port: u16, mode: Mode, config: &SmokeConfig) -> Result<()> {
    let listen_arg = format!("--vice-opt-http-listen-addr=127.0.0.1:{port}");
    log(format!("Running browservice with {listen_arg}"));
    let mut process = launch(exe, &[listen_arg.as_str()], LaunchOptions::default())?;

    let client = Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .no_proxy()
        .build()
        .context("building HTTP client")?;
    let mut session = Session {
        client,
        prefix: format!("http://127.0.0.1:{port}"),
        html: String::new(),
        img_prefix: String::new(),
        img_idx: 0,
    };

    session.wait_for_server()?;
    for pattern in FORWARD_PATTERNS {
        session.forward(pattern)?;
    }

    log(format!(
        "Parsing image request prefix from response HTML of length {}",
        session.html.len()
    ));
    session.img_prefix = format!(
        "{}{}",
        session.prefix,
        extract_path(&session.html, IMAGE_PATH_PATTERN)?
    );
    log(format!("Parsed image prefix {}", session.img_prefix));

    session.wait_for_shape()?;

    log("Waiting for the image to have non-white control bar and white content");
    session.wait_for(|frame| {
        log(format!(
            "Image has top mean brightness {} and bottom mean brightness {}",
            frame.control_bar_brightness(),
            frame.content_brightness()
        ));
        frame::is_empty_page(frame)
    })?;
    log("Image of correct brightness distribution received");

    log("Navigating browser to a data URL that fills the page with text");
    session.goto(&text_page_url())?;
    log("Waiting for the content area in the image to become dark enough");
    session.wait_for(|frame| {
        log(format!(
            "Image has bottom mean brightness {}",
            frame.content_brightness()
        ));
        frame::has_text_content(frame)
    })?;
    log("Image with content area sufficiently dark received");

    if mode.allow_online() {
        log(format!(
            "Navigating browser to the test image URL {}",
            config.test_image_url
        ));
        session.goto(&config.test_image_url)?;
    } else {
        log("Navigating browser to the test image data URL");
        session.goto(&test_image_data_url()?)?;
    }
    log("Waiting for the image to contain the test image colors");
    session.wait_for(|frame| {
        log(format!(
            "Pixel counts for each test image color: {:?}",
            frame::test_color_counts(frame)
        ));
        frame::shows_test_image(frame)
    })?;
    log("Image with content area containing the test image colors received");

    log("Sending Ctrl+C to Browservice and waiting for it to terminate");
    process.interrupt()?;
    let status = process.wait_timeout(EXIT_TIMEOUT)?;

    log("Browservice exited, checking exit status");
    if status.code() != Some(0) {
        bail!("Browservice exit status is {status} != 0");
    }

    log("Browser test completed successfully");
    Ok(())
}
