//! Fullscreen terminal "now playing" display.
//!
//! Album art is drawn with upper half blocks, each cell carrying two image
//! pixels (foreground is the top pixel, background the bottom one), next to
//! the title, artist, album and year. The song file is re-read on every
//! refresh tick; Esc, `q` or Ctrl-C exits and removes it.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute, queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use log::{info, warn};

use crate::now_playing::{self, NowPlaying};

/// One terminal cell of album art.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtCell {
    pub top: [u8; 3],
    pub bottom: [u8; 3],
}

/// Scale `img` to `cols` x `rows * 2` pixels and pair them up into cells.
pub fn render_art(img: &DynamicImage, cols: u16, rows: u16) -> Vec<Vec<ArtCell>> {
    if cols == 0 || rows == 0 {
        return Vec::new();
    }
    let resized = img.resize_exact(cols as u32, rows as u32 * 2, FilterType::Triangle);

    (0..rows as u32)
        .map(|y| {
            (0..cols as u32)
                .map(|x| {
                    let top = resized.get_pixel(x, y * 2);
                    let bottom = resized.get_pixel(x, y * 2 + 1);
                    ArtCell {
                        top: [top[0], top[1], top[2]],
                        bottom: [bottom[0], bottom[1], bottom[2]],
                    }
                })
                .collect()
        })
        .collect()
}

/// Decode the image at `path`, sniffing the format from its content.
pub fn load_art(path: &Path) -> Option<DynamicImage> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Error loading album art {}: {}", path.display(), e);
            return None;
        }
    };
    match image::load_from_memory(&bytes) {
        Ok(img) => Some(img),
        Err(e) => {
            warn!("Error decoding album art {}: {}", path.display(), e);
            None
        }
    }
}

/// Screen positions for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub art_col: u16,
    pub art_row: u16,
    pub art_cols: u16,
    pub art_rows: u16,
    pub text_col: u16,
    pub text_row: u16,
    pub text_width: u16,
}

impl Layout {
    /// Square art on the left taking about two thirds of the height,
    /// text to its right. Small terminals drop the art.
    pub fn compute(width: u16, height: u16) -> Layout {
        let margin = 2;
        let text_lines = 7; // four fields plus spacing
        let max_rows_by_height = height.saturating_sub(2 * margin).saturating_mul(2) / 3;
        let max_rows_by_width = width.saturating_sub(3 * margin + 20) / 4;
        let art_rows = max_rows_by_height.min(max_rows_by_width);

        if art_rows < 4 {
            return Layout {
                art_col: 0,
                art_row: 0,
                art_cols: 0,
                art_rows: 0,
                text_col: 1,
                text_row: height.saturating_sub(text_lines) / 2,
                text_width: width.saturating_sub(2),
            };
        }

        // A cell is about twice as tall as wide
        let art_cols = art_rows * 2;
        let art_row = (height - art_rows) / 2;
        let text_col = margin + art_cols + 2 * margin;
        Layout {
            art_col: margin,
            art_row,
            art_cols,
            art_rows,
            text_col,
            text_row: art_row + art_rows.saturating_sub(text_lines) / 2,
            text_width: width.saturating_sub(text_col + margin),
        }
    }
}

/// Cut `text` to `width` characters, ending in an ellipsis when shortened.
pub fn fit_text(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut fitted: String = text.chars().take(width - 1).collect();
    fitted.push('…');
    fitted
}

/// Restores the terminal when dropped, including on early returns.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen, cursor::Hide)?;
        Ok(TerminalGuard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        execute!(io::stdout(), ResetColor, cursor::Show, LeaveAlternateScreen).ok();
        terminal::disable_raw_mode().ok();
    }
}

fn is_exit_key(key: &KeyEvent) -> bool {
    if key.kind == KeyEventKind::Release {
        return false;
    }
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

pub struct Kiosk {
    song_file: PathBuf,
    default_album_art: PathBuf,
    refresh: Duration,
    record: NowPlaying,
    art: Option<DynamicImage>,
}

impl Kiosk {
    pub fn new(song_file: PathBuf, default_album_art: PathBuf, refresh: Duration) -> Self {
        let record = NowPlaying::fallback(&default_album_art);
        Kiosk {
            song_file,
            default_album_art,
            refresh,
            record,
            art: None,
        }
    }

    /// Re-read the song file and its album art.
    pub fn reload(&mut self) {
        self.record = now_playing::read_or_fallback(&self.song_file, &self.default_album_art);
        self.art = load_art(Path::new(&self.record.album_art));
    }

    pub fn record(&self) -> &NowPlaying {
        &self.record
    }

    /// Show the display until an exit key is pressed or `stop` is set.
    /// Leaving through a key sets `stop` and removes the song file.
    pub fn run(&mut self, stop: &AtomicBool) -> io::Result<()> {
        let guard = TerminalGuard::enter()?;
        let mut stdout = io::stdout();

        self.reload();
        self.draw(&mut stdout)?;
        let mut last_refresh = Instant::now();

        while !stop.load(Ordering::Relaxed) {
            if event::poll(Duration::from_millis(200))? {
                match event::read()? {
                    Event::Key(key) if is_exit_key(&key) => {
                        stop.store(true, Ordering::Relaxed);
                        break;
                    }
                    Event::Resize(_, _) => self.draw(&mut stdout)?,
                    _ => {}
                }
            }

            if last_refresh.elapsed() >= self.refresh {
                self.reload();
                self.draw(&mut stdout)?;
                last_refresh = Instant::now();
            }
        }

        drop(guard);
        now_playing::remove_now_playing(&self.song_file)?;
        info!("Display closed, removed {}", self.song_file.display());
        Ok(())
    }

    fn draw<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let (width, height) = terminal::size().unwrap_or((80, 24));
        let layout = Layout::compute(width, height);

        queue!(out, SetBackgroundColor(Color::Black), Clear(ClearType::All))?;

        if let Some(img) = &self.art {
            let cells = render_art(img, layout.art_cols, layout.art_rows);
            for (dy, row) in cells.iter().enumerate() {
                queue!(out, cursor::MoveTo(layout.art_col, layout.art_row + dy as u16))?;
                for cell in row {
                    queue!(
                        out,
                        SetForegroundColor(rgb(cell.top)),
                        SetBackgroundColor(rgb(cell.bottom)),
                        Print('▀')
                    )?;
                }
            }
        }

        let text_width = layout.text_width as usize;
        let lines = [
            (&self.record.title, true, 0),
            (&self.record.artist, false, 2),
            (&self.record.album, false, 4),
            (&self.record.year, false, 6),
        ];
        queue!(out, SetBackgroundColor(Color::Black), SetForegroundColor(Color::White))?;
        for (text, bold, offset) in lines {
            queue!(out, cursor::MoveTo(layout.text_col, layout.text_row + offset))?;
            if bold {
                queue!(out, SetAttribute(Attribute::Bold))?;
            }
            queue!(out, Print(fit_text(text, text_width)))?;
            if bold {
                queue!(out, SetAttribute(Attribute::NormalIntensity))?;
            }
        }

        queue!(out, ResetColor)?;
        out.flush()
    }
}

fn rgb(c: [u8; 3]) -> Color {
    Color::Rgb {
        r: c[0],
        g: c[1],
        b: c[2],
    }
}
