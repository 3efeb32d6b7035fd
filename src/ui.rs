use iced::widget::{
    button, checkbox, column, container, pick_list, radio, row, scrollable, text, text_input,
    Column, Row,
};
use iced::{Element, Length};

use uart_assistant::connection::{DataBits, Parity, StopBits, BAUD_RATES};
use uart_assistant::hex::DataFormat;
use uart_assistant::settings::{FONT_FAMILIES, FONT_SIZES};
use uart_assistant::theme;

use crate::app::{App, Message, Page, SettingsEdit};

pub fn view(app: &App) -> Element<'_, Message> {
    let nav_bar = row![
        nav_button("Terminal", Page::Terminal, app.page),
        nav_button("Shortcuts", Page::Shortcuts, app.page),
        nav_button("Settings", Page::Settings, app.page),
    ]
    .spacing(5)
    .padding([10, 20]);

    let content = match app.page {
        Page::Terminal => terminal_view(app),
        Page::Shortcuts => shortcuts_view(app),
        Page::Settings => settings_view(app),
    };

    container(column![nav_bar, content, status_bar(app)].spacing(10))
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}

fn nav_button<'a>(label: &'a str, page: Page, current: Page) -> Element<'a, Message> {
    button(text(label).size(if page == current { 16 } else { 14 }))
        .on_press(Message::Show(page))
        .into()
}

fn terminal_view(app: &App) -> Element<'_, Message> {
    let controller = &app.controller;
    let settings = controller.settings();
    let open = controller.is_open();

    let port_row = row![
        pick_list(app.ports.as_slice(), app.selected_port.as_ref(), Message::PortSelected)
            .placeholder("Port"),
        button("Refresh").on_press_maybe((!open).then_some(Message::RefreshPorts)),
        button(if open { "Close port" } else { "Open port" }).on_press(Message::ToggleConnection),
    ]
    .spacing(10);

    // Parameters are fixed while the port is open.
    let parameters: Element<Message> = match controller.connection() {
        Some(config) => text(format!(
            "{} | receive {} | send {}",
            config, config.receive_format, config.send_format
        ))
        .size(14)
        .into(),
        None => column![
            row![
                pick_list(BAUD_RATES.to_vec(), Some(settings.baud_rate), Message::BaudSelected),
                pick_list(DataBits::ALL.to_vec(), Some(settings.data_bits), Message::DataBitsSelected),
                pick_list(Parity::ALL.to_vec(), Some(settings.parity), Message::ParitySelected),
                pick_list(StopBits::ALL.to_vec(), Some(settings.stop_bits), Message::StopBitsSelected),
            ]
            .spacing(10),
            row![
                text("Receive:"),
                radio("HEX", DataFormat::Hex, Some(settings.receive_format), Message::ReceiveFormatSelected),
                radio("ASCII", DataFormat::Ascii, Some(settings.receive_format), Message::ReceiveFormatSelected),
                text("Send:"),
                radio("HEX", DataFormat::Hex, Some(settings.send_format), Message::SendFormatSelected),
                radio("ASCII", DataFormat::Ascii, Some(settings.send_format), Message::SendFormatSelected),
                checkbox("Append CRLF", settings.line_ending).on_toggle(Message::LineEndingToggled),
            ]
            .spacing(10),
        ]
        .spacing(10)
        .into(),
    };

    let terminal_display = container(scrollable(
        text(controller.scrollback().as_str())
            .font(theme::font(&settings.font_family))
            .size(f32::from(settings.font_size)),
    ))
    .padding(10)
    .height(Length::FillPortion(3))
    .width(Length::Fill);

    let input_row = row![
        button("Open file").on_press(Message::OpenFile),
        text_input("Data to send", controller.input())
            .on_input(Message::InputChanged)
            .on_submit(Message::Send)
            .width(Length::FillPortion(4)),
        button("Send")
            .on_press_maybe(open.then_some(Message::Send))
            .width(Length::FillPortion(1)),
        button("Clear").on_press(Message::ClearInput),
    ]
    .spacing(10);

    let quick_send = Row::with_children(controller.shortcuts().iter().map(|(index, line)| {
        button(text(index.to_string()))
            .on_press_maybe((open && !line.is_empty()).then_some(Message::SendShortcut(index)))
            .into()
    }))
    .spacing(5);

    let controls = row![
        checkbox("Auto-send every", controller.is_auto_sending())
            .on_toggle_maybe(open.then_some(Message::AutoSendToggled)),
        text_input("ms", &app.auto_send_period)
            .on_input(Message::AutoSendPeriodChanged)
            .width(Length::Fixed(80.0)),
        text("ms"),
        checkbox("Timestamp", settings.timestamp).on_toggle(Message::TimestampToggled),
        button("Clear receive").on_press(Message::ClearTerminal),
        button("Save log").on_press(Message::SaveLog),
        text(format!(
            "Sent: {} bytes | Received: {} bytes",
            controller.sent_bytes(),
            controller.received_bytes()
        ))
        .size(12),
    ]
    .spacing(10);

    column![port_row, parameters, terminal_display, input_row, quick_send, controls]
        .spacing(10)
        .padding(10)
        .into()
}

fn shortcuts_view(app: &App) -> Element<'_, Message> {
    let open = app.controller.is_open();

    let slots = app.controller.shortcuts().iter().map(|(index, line)| {
        row![
            text(format!("{:>2}", index)).width(Length::Fixed(30.0)),
            text_input("", line)
                .on_input(move |s| Message::ShortcutEdited(index, s))
                .width(Length::Fill),
            button("Send")
                .on_press_maybe((open && !line.is_empty()).then_some(Message::SendShortcut(index))),
        ]
        .spacing(10)
        .into()
    });

    column![
        Column::with_children(slots).spacing(5),
        row![
            button("Import...").on_press(Message::ImportShortcuts),
            button("Export...").on_press(Message::ExportShortcuts),
        ]
        .spacing(10),
    ]
    .spacing(15)
    .padding(10)
    .into()
}

fn labeled<'a>(label: &'a str, control: impl Into<Element<'a, Message>>) -> Element<'a, Message> {
    let control: Element<'a, Message> = control.into();
    row![text(label).width(Length::Fixed(180.0)), control]
        .spacing(10)
        .into()
}

fn settings_view(app: &App) -> Element<'_, Message> {
    let d = &app.draft;
    let edit = |e: SettingsEdit| Message::Edit(e);

    let families: Vec<String> = FONT_FAMILIES.iter().map(|f| f.to_string()).collect();
    let sizes: Vec<u16> = FONT_SIZES.collect();

    let appearance = column![
        text("Appearance").size(18),
        labeled(
            "Font",
            pick_list(families, Some(&d.font_family), move |f| edit(SettingsEdit::FontFamily(f)))
        ),
        labeled(
            "Font size",
            pick_list(sizes, Some(d.font_size), move |s| edit(SettingsEdit::FontSize(s)))
        ),
        labeled(
            "Theme",
            pick_list(app.themes.as_slice(), Some(&d.theme), move |t| edit(SettingsEdit::Theme(t)))
        ),
    ]
    .spacing(8);

    let serial = column![
        text("Serial defaults").size(18),
        labeled(
            "Baud rate",
            pick_list(BAUD_RATES.to_vec(), Some(d.baud_rate), move |b| edit(SettingsEdit::Baud(b)))
        ),
        labeled(
            "Data bits",
            pick_list(DataBits::ALL.to_vec(), Some(d.data_bits), move |b| edit(SettingsEdit::DataBits(b)))
        ),
        labeled(
            "Parity",
            pick_list(Parity::ALL.to_vec(), Some(d.parity), move |p| edit(SettingsEdit::Parity(p)))
        ),
        labeled(
            "Stop bits",
            pick_list(StopBits::ALL.to_vec(), Some(d.stop_bits), move |b| edit(SettingsEdit::StopBits(b)))
        ),
        labeled(
            "Receive format",
            pick_list(DataFormat::ALL.to_vec(), Some(d.receive_format), move |f| {
                edit(SettingsEdit::ReceiveFormat(f))
            })
        ),
        labeled(
            "Send format",
            pick_list(DataFormat::ALL.to_vec(), Some(d.send_format), move |f| {
                edit(SettingsEdit::SendFormat(f))
            })
        ),
        labeled(
            "Auto-send period (ms)",
            text_input("1000", &app.draft_auto_send)
                .on_input(move |s| edit(SettingsEdit::AutoSendMs(s)))
                .width(Length::Fixed(120.0))
        ),
    ]
    .spacing(8);

    let behaviour = column![
        text("Behaviour").size(18),
        checkbox("Timestamp received lines", d.timestamp)
            .on_toggle(move |v| edit(SettingsEdit::Timestamp(v))),
        checkbox("Append CRLF", d.line_ending).on_toggle(move |v| edit(SettingsEdit::LineEnding(v))),
        checkbox("Show sent data", d.echo_sent).on_toggle(move |v| edit(SettingsEdit::EchoSent(v))),
        checkbox("Refresh port list automatically", d.auto_refresh_ports)
            .on_toggle(move |v| edit(SettingsEdit::AutoRefresh(v))),
    ]
    .spacing(8);

    let directory = d
        .autosave
        .directory
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<not set>".to_string());
    let autosave = column![
        text("Auto-save").size(18),
        checkbox("Save received data periodically", d.autosave.enabled)
            .on_toggle(move |v| edit(SettingsEdit::Autosave(v))),
        labeled(
            "Directory",
            row![text(directory), button("Browse...").on_press(Message::ChooseAutosaveDir)].spacing(10)
        ),
        labeled(
            "Interval (s)",
            text_input("60", &app.draft_autosave_interval)
                .on_input(move |s| edit(SettingsEdit::AutosaveInterval(s)))
                .width(Length::Fixed(120.0))
        ),
    ]
    .spacing(8);

    let sniffer = column![
        text("Packet sniffer").size(18),
        checkbox("Extract framed packets (HEX receive)", d.sniffer.enabled)
            .on_toggle(move |v| edit(SettingsEdit::Sniffer(v))),
        labeled(
            "Head byte",
            text_input("5a", &d.sniffer.head)
                .on_input(move |s| edit(SettingsEdit::Head(s)))
                .width(Length::Fixed(60.0))
        ),
        labeled(
            "Tail byte",
            text_input("a5", &d.sniffer.tail)
                .on_input(move |s| edit(SettingsEdit::Tail(s)))
                .width(Length::Fixed(60.0))
        ),
    ]
    .spacing(8);

    let actions = row![
        button("Restore defaults").on_press(Message::RestoreDefaults),
        button("Apply").on_press(Message::ApplySettings),
        button("Cancel").on_press(Message::CancelSettings),
        button("OK").on_press(Message::CommitSettings),
    ]
    .spacing(10);

    scrollable(
        column![appearance, serial, behaviour, autosave, sniffer, actions]
            .spacing(20)
            .padding(10),
    )
    .height(Length::Fill)
    .into()
}

fn status_bar(app: &App) -> Element<'_, Message> {
    let bar: Element<Message> = match &app.notice {
        Some(notice) => row![
            text(notice.as_str()).size(14),
            button("Dismiss").on_press(Message::DismissNotice),
        ]
        .spacing(10)
        .into(),
        None => {
            let state = match app.controller.connection() {
                Some(config) => format!("Open: {}", config),
                None => "Closed".to_string(),
            };
            let autosave = if app.controller.is_autosaving() { " | auto-save on" } else { "" };
            text(format!("{}{}", state, autosave)).size(12).into()
        }
    };
    container(bar).padding([5, 20]).into()
}
