use iocraft::prelude::*;

use crate::model::SummaryMode;

#[component]
pub fn Header() -> impl Into<AnyElement<'static>> {
    element! {
        View(flex_direction: FlexDirection::Column) {
            Text(content: "AI PDF Summarizer", weight: Weight::Bold, color: Color::Blue)
            Text(content: "Drop a PDF onto this terminal or type its path. Max file size: 50MB, text-based PDFs only.", color: Color::DarkGrey)
        }
    }
}

#[component]
pub fn ConfigHeader() -> impl Into<AnyElement<'static>> {
    element! {
        View(flex_direction: FlexDirection::Column) {
            Text(content: "pdfsum configuration", weight: Weight::Bold, color: Color::Blue)
            Text(content: "Press enter to keep the value in brackets.", color: Color::DarkGrey)
        }
    }
}

#[derive(Default, Props)]
pub struct InputPromptProps {
    pub prompt: String,
    pub default: Option<String>,
    pub description: Option<String>,
}

#[component]
pub fn InputPrompt(props: &InputPromptProps) -> impl Into<AnyElement<'static>> {
    let prompt = match &props.default {
        Some(default) => format!("{} [{}]", props.prompt, default),
        None => props.prompt.clone(),
    };
    element! {
        View(flex_direction: FlexDirection::Column) {
            Text(content: prompt, weight: Weight::Bold)
            #(props.description.as_ref().map(|description| element! {
                Text(content: description.clone(), color: Color::DarkGrey)
            }))
        }
    }
}

#[derive(Default, Props)]
pub struct MessageProps {
    pub message: String,
}

#[component]
pub fn ErrorMessage(props: &MessageProps) -> impl Into<AnyElement<'static>> {
    element! {
        View(flex_direction: FlexDirection::Row) {
            Text(content: "▲ ", color: Color::Red)
            Text(content: &props.message, color: Color::Red)
        }
    }
}

#[component]
pub fn SuccessMessage(props: &MessageProps) -> impl Into<AnyElement<'static>> {
    element! {
        View(flex_direction: FlexDirection::Row) {
            Text(content: "◆ ", color: Color::Green)
            Text(content: &props.message)
        }
    }
}

#[derive(Default, Props)]
pub struct ModeOptionsProps {
    pub selected: SummaryMode,
}

#[component]
pub fn ModeOptions(props: &ModeOptionsProps) -> impl Into<AnyElement<'static>> {
    element! {
        View(flex_direction: FlexDirection::Column) {
            #(SummaryMode::ALL.iter().enumerate().map(|(index, mode)| {
                let selected = *mode == props.selected;
                let marker = if selected { "●" } else { "○" };
                let color = if selected { Color::Blue } else { Color::Reset };
                element! {
                    View(flex_direction: FlexDirection::Row) {
                        Text(content: format!("{} {}. ", marker, index + 1), color: color)
                        Text(content: mode.label(), weight: Weight::Bold, color: color)
                        Text(content: format!("  {}", mode.description()), color: Color::DarkGrey)
                    }
                }
            }))
        }
    }
}

#[derive(Default, Props)]
pub struct DocumentReadyProps {
    pub name: String,
    pub page_count: Option<u32>,
}

#[component]
pub fn DocumentReady(props: &DocumentReadyProps) -> impl Into<AnyElement<'static>> {
    let pages = match props.page_count {
        Some(1) => " (1 page)".to_string(),
        Some(n) => format!(" ({} pages)", n),
        None => String::new(),
    };
    element! {
        View(flex_direction: FlexDirection::Row) {
            Text(content: "◆ ", color: Color::Green)
            Text(content: "File Selected: ", weight: Weight::Bold)
            Text(content: format!("{}{}", props.name, pages))
        }
    }
}

#[derive(Default, Props)]
pub struct SummaryHeaderProps {
    pub mode: SummaryMode,
    pub elapsed: Option<String>,
}

#[component]
pub fn SummaryHeader(props: &SummaryHeaderProps) -> impl Into<AnyElement<'static>> {
    element! {
        View(flex_direction: FlexDirection::Row) {
            Text(content: "┌ ")
            View(background_color: Color::Blue) {
                Text(content: " Generated Summary ", color: Color::White)
            }
            Text(content: format!(" {}", props.mode.label()), color: Color::DarkGrey)
            #(props.elapsed.as_ref().map(|elapsed| element! {
                Text(content: format!(" · {}", elapsed), color: Color::DarkGrey)
            }))
        }
    }
}

#[derive(Default, Props)]
pub struct SummaryActionsProps {
    pub copied: bool,
}

#[component]
pub fn SummaryActions(props: &SummaryActionsProps) -> impl Into<AnyElement<'static>> {
    let (copy, copy_color) = if props.copied {
        ("✓ copied", Color::Green)
    } else {
        ("[c] copy", Color::Reset)
    };
    element! {
        View(flex_direction: FlexDirection::Row) {
            Text(content: "└ ")
            Text(content: copy, color: copy_color)
            Text(content: "  [d] download summary.md  [m] other mode  [n] summarize another document  [q] quit")
        }
    }
}

#[derive(Default, Props)]
pub struct WorkingProps {
    pub label: String,
}

#[component]
pub fn Working(props: &WorkingProps) -> impl Into<AnyElement<'static>> {
    element! {
        View(flex_direction: FlexDirection::Row) {
            Spinner()
            Text(content: format!(" {}", props.label), color: Color::Blue)
        }
    }
}

#[derive(Default, Props)]
pub struct SpinnerProps {
    pub color: Option<Color>,
}

#[component]
pub fn Spinner(props: &SpinnerProps, mut hooks: Hooks) -> impl Into<AnyElement<'static>> {
    let mut frame = hooks.use_state(|| 0usize);

    hooks.use_future(async move {
        loop {
            tokio::time::sleep(tokio::time::Duration::from_millis(250)).await;
            frame.set((frame.get() + 1) % 4);
        }
    });

    let spinner_chars = ["◐", "◓", "◑", "◒"];
    let current_char = spinner_chars[*frame.read()];
    let color = props.color.unwrap_or(Color::Cyan);

    element! {
        Text(content: current_char, color: color)
    }
}
