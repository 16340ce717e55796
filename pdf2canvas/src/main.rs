use anyhow::Context;
use clap::Parser;
use iced::{
    widget::{button, column, container, horizontal_space, image as img, row, scrollable, text, text_input},
    Element, Length, Task, Theme,
};
use iced::widget::image::Handle;
use pdf2canvas::session::{self, LoadTicket, PreparedDocument};
use pdf2canvas::{PdfiumBackend, Viewer, ViewerConfig};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "pdf2canvas", version, about = "Rasterize a PDF, page through it and export pages as PNG")]
struct Args {
    /// PDF to open on startup
    file: Option<PathBuf>,

    /// JSON viewer configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured device pixel ratio
    #[arg(long)]
    device_pixel_ratio: Option<f32>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("pdf2canvas=debug,info")
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => ViewerConfig::from_file(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => ViewerConfig::default(),
    };
    if let Some(ratio) = args.device_pixel_ratio {
        config.device_pixel_ratio = ratio;
    }
    let viewer = Viewer::new(PdfiumBackend, config).context("Invalid configuration")?;

    iced::application("PDF to Image", App::update, App::view)
        .theme(|_| Theme::Dark)
        .run_with(move || App::new(viewer, args.file))?;
    Ok(())
}

#[derive(Debug, Clone)]
enum Message {
    PathChanged(String),
    OpenFile,
    FileLoaded(LoadTicket, Result<Arc<PreparedDocument>, String>),
    PreviousPage,
    NextPage,
    ToggleZoom,
    Download,
    Saved(Result<String, String>),
    DumpAll,
}

struct App {
    viewer: Viewer<PdfiumBackend>,
    path_input: String,
    page_view: Option<Handle>,
    dump: Vec<Handle>,
    notice: Option<String>,
}

impl App {
    fn new(viewer: Viewer<PdfiumBackend>, file: Option<PathBuf>) -> (Self, Task<Message>) {
        let mut app = Self {
            viewer,
            path_input: file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            page_view: None,
            dump: Vec::new(),
            notice: None,
        };
        let task = if file.is_some() { app.open() } else { Task::none() };
        (app, task)
    }

    fn open(&mut self) -> Task<Message> {
        let path = PathBuf::from(self.path_input.trim());
        let ticket = self.viewer.begin_load();
        let decoder = self.viewer.decoder().clone();
        let rasterizer = self.viewer.rasterizer();
        let filter = self.viewer.page_filter();

        Task::perform(
            async move {
                let input = session::read_input(&path).await?;
                session::prepare(&decoder, &rasterizer, input, filter.as_ref())
            },
            move |result| {
                Message::FileLoaded(ticket, result.map(Arc::new).map_err(|e| e.to_string()))
            },
        )
    }

    fn refresh(&mut self) {
        self.page_view = match self.viewer.render_view() {
            Ok(view) => {
                let (width, height) = view.dimensions();
                Some(Handle::from_rgba(width, height, view.into_raw()))
            }
            Err(_) => None,
        };
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::PathChanged(path) => self.path_input = path,
            Message::OpenFile => return self.open(),
            Message::FileLoaded(ticket, result) => {
                let prepared = result
                    .map(|p| Arc::try_unwrap(p).unwrap_or_else(|p| (*p).clone()))
                    .map_err(pdf2canvas::ViewerError::Load);
                match self.viewer.finish_load(ticket, prepared) {
                    Ok(()) => {
                        self.dump.clear();
                        self.notice = None;
                        self.refresh();
                    }
                    Err(e) => self.notice = Some(e.to_string()),
                }
            }
            Message::PreviousPage => {
                if self.viewer.previous_page() {
                    self.refresh();
                }
            }
            Message::NextPage => {
                if self.viewer.next_page() {
                    self.refresh();
                }
            }
            Message::ToggleZoom => {
                if let Err(e) = self.viewer.toggle_zoom() {
                    tracing::warn!("Failed to change zoom: {}", e);
                }
            }
            Message::Download => match self.viewer.export_png() {
                Ok(export) => {
                    return Task::perform(
                        async move {
                            tokio::fs::write(&export.file_name, &export.bytes)
                                .await
                                .map(|()| export.file_name)
                                .map_err(|e| e.to_string())
                        },
                        Message::Saved,
                    );
                }
                Err(e) => self.notice = Some(e.to_string()),
            },
            Message::Saved(result) => {
                self.notice = Some(match result {
                    Ok(name) => format!("Saved {}", name),
                    Err(e) => format!("Failed to save image: {}", e),
                });
            }
            Message::DumpAll => match self.viewer.export_all() {
                Ok(pages) => {
                    self.dump = pages
                        .into_iter()
                        .map(|page| Handle::from_bytes(page.png))
                        .collect();
                    self.refresh();
                }
                Err(e) => self.notice = Some(e.to_string()),
            },
        }
        Task::none()
    }

    fn view(&self) -> Element<Message> {
        let ready = self.viewer.page_count() > 0;

        let toolbar = row![
            text_input("Path to a PDF", &self.path_input)
                .on_input(Message::PathChanged)
                .on_submit(Message::OpenFile)
                .width(Length::Fixed(320.0)),
            button("Open").on_press(Message::OpenFile),
            horizontal_space(),
            button("◀").on_press_maybe(ready.then_some(Message::PreviousPage)),
            text(format!(
                "Page {} of {}",
                self.viewer.current_page() + usize::from(ready),
                self.viewer.page_count()
            )),
            button("▶").on_press_maybe(ready.then_some(Message::NextPage)),
            button("Zoom").on_press_maybe(ready.then_some(Message::ToggleZoom)),
            text(format!(
                "{}%",
                (self.viewer.viewport().map_or(1.0, |v| v.zoom()) * 100.0) as i32
            )),
            horizontal_space(),
            button("Download").on_press_maybe(ready.then_some(Message::Download)),
            button("Dump all pages").on_press_maybe(ready.then_some(Message::DumpAll)),
        ]
        .spacing(10)
        .padding(10);

        let page_view: Element<Message> = match (&self.page_view, self.viewer.viewport()) {
            (Some(handle), Some(viewport)) if self.viewer.status().placeholder().is_none() => {
                let display = viewport.surface_size();
                scrollable(img(handle.clone()).width(Length::Fixed(display.width)).height(Length::Fixed(display.height)))
                    .direction(scrollable::Direction::Both {
                        vertical: scrollable::Scrollbar::default(),
                        horizontal: scrollable::Scrollbar::default(),
                    })
                    .width(Length::Fill)
                    .height(Length::Fill)
                    .into()
            }
            _ => container(text(self.viewer.status().placeholder().unwrap_or("Rendering page...")).size(24))
                .width(Length::Fill)
                .height(Length::Fill)
                .center_x(Length::Fill)
                .center_y(Length::Fill)
                .into(),
        };

        let mut content = column![toolbar, page_view].spacing(10).padding(10);

        if !self.dump.is_empty() {
            let gallery = self
                .dump
                .iter()
                .fold(row![].spacing(10), |gallery, handle| {
                    gallery.push(img(handle.clone()).height(Length::Fixed(160.0)))
                });
            content = content.push(
                scrollable(gallery).direction(scrollable::Direction::Horizontal(scrollable::Scrollbar::default())),
            );
        }
        if let Some(notice) = &self.notice {
            content = content.push(text(notice.clone()).size(14));
        }

        content.into()
    }
}
