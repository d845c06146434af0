//! Main egui application: connect bar, mint panel, and toast overlay.

use std::time::{Duration, Instant};

use client_core::{short_address, MintStatus};
use crossbeam_channel::{Receiver, Sender};
use rpc_wallet::config::Settings;
use shared::{
    domain::{Address, MintPolicy},
    notify::{Notification, NoticeKind},
};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::UiEvent;
use crate::controller::orchestration::dispatch_backend_command;

const TOAST_WIDTH: f32 = 280.0;

#[derive(Clone, Copy, PartialEq, Eq)]
enum AppViewState {
    Startup,
    Mint,
}

struct ActiveToast {
    notice: Notification,
    raised_at: Instant,
}

impl ActiveToast {
    fn expired(&self, now: Instant) -> bool {
        match self.notice.duration_secs {
            Some(secs) => now.duration_since(self.raised_at) >= Duration::from_secs(secs),
            None => false,
        }
    }
}

pub struct MintApp {
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,
    view_state: AppViewState,
    accounts: Vec<Address>,
    quantity: u8,
    mint_status: MintStatus,
    policy: MintPolicy,
    contract_configured: bool,
    toasts: Vec<ActiveToast>,
    status: String,
}

impl MintApp {
    pub fn new(settings: Settings, cmd_tx: Sender<BackendCommand>, ui_rx: Receiver<UiEvent>) -> Self {
        let quantity = settings.policy.min_quantity;
        Self {
            cmd_tx,
            ui_rx,
            view_state: AppViewState::Startup,
            accounts: Vec::new(),
            quantity,
            mint_status: MintStatus::Idle,
            policy: settings.policy,
            contract_configured: false,
            toasts: Vec::new(),
            status: "Starting wallet backend".to_string(),
        }
    }

    fn connected(&self) -> bool {
        !self.accounts.is_empty()
    }

    fn process_ui_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            match event {
                UiEvent::BackendReady { contract_configured } => {
                    self.contract_configured = contract_configured;
                    self.view_state = AppViewState::Mint;
                    self.status = if contract_configured {
                        "Backend ready".to_string()
                    } else {
                        "Backend ready; no mint contract configured".to_string()
                    };
                }
                UiEvent::AccountsChanged { accounts } => {
                    self.accounts = accounts;
                }
                UiEvent::QuantityChanged(quantity) => {
                    self.quantity = quantity;
                }
                UiEvent::MintStatusChanged(status) => {
                    // Returning to Idle retires the indefinite "submitted"
                    // toast; the terminal success/failure toast replaces it.
                    if status == MintStatus::Idle {
                        self.toasts.retain(|toast| !toast.notice.is_indefinite());
                    }
                    self.mint_status = status;
                }
                UiEvent::Notice(notice) => {
                    self.toasts.push(ActiveToast {
                        notice,
                        raised_at: Instant::now(),
                    });
                }
                UiEvent::ReloadRequired => self.reset_after_chain_switch(),
            }
        }
        let now = Instant::now();
        self.toasts.retain(|toast| !toast.expired(now));
    }

    // Chain switched under us: drop all session-derived state and start over,
    // the way a page reload would.
    fn reset_after_chain_switch(&mut self) {
        self.accounts.clear();
        self.quantity = self.policy.min_quantity;
        self.mint_status = MintStatus::Idle;
        self.toasts.clear();
        self.status = "Network changed; reconnect your wallet".to_string();
    }

    fn show_startup_screen(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.centered_and_justified(|ui| {
                ui.label(&self.status);
            });
        });
    }

    fn show_mint_screen(&mut self, ctx: &egui::Context) {
        self.show_top_bar(ctx);
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(40.0);
                ui.heading("NFT Mint");
                ui.add_space(8.0);
                ui.label("It's 2078. Can the robots mint their own NFTs?");
                ui.add_space(24.0);
                if self.connected() {
                    self.show_mint_controls(ui);
                } else {
                    ui.label("You must be connected to mint.");
                }
            });
        });
        self.show_toasts(ctx);
    }

    fn show_top_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("mint_top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(&self.status);
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    match self.accounts.first() {
                        Some(account) => {
                            ui.monospace(short_address(account));
                            ui.label("Connected:");
                        }
                        None => {
                            if ui.button("Connect Wallet").clicked() {
                                dispatch_backend_command(
                                    &self.cmd_tx,
                                    BackendCommand::ConnectWallet,
                                    &mut self.status,
                                );
                            }
                        }
                    }
                });
            });
        });
    }

    fn show_mint_controls(&mut self, ui: &mut egui::Ui) {
        let busy = self.mint_status != MintStatus::Idle;
        ui.horizontal(|ui| {
            ui.with_layout(
                egui::Layout::left_to_right(egui::Align::Center)
                    .with_main_align(egui::Align::Center),
                |ui| {
                    let can_decrement = !busy && self.quantity > self.policy.min_quantity;
                    if ui.add_enabled(can_decrement, egui::Button::new("-")).clicked() {
                        dispatch_backend_command(
                            &self.cmd_tx,
                            BackendCommand::DecrementQuantity,
                            &mut self.status,
                        );
                    }
                    ui.monospace(format!("{}", self.quantity));
                    let can_increment = !busy && self.quantity < self.policy.max_quantity;
                    if ui.add_enabled(can_increment, egui::Button::new("+")).clicked() {
                        dispatch_backend_command(
                            &self.cmd_tx,
                            BackendCommand::IncrementQuantity,
                            &mut self.status,
                        );
                    }
                },
            );
        });
        ui.add_space(16.0);
        let label = match self.mint_status {
            MintStatus::Idle => "Mint Now",
            MintStatus::Submitting => "Submitting...",
            MintStatus::AwaitingConfirmation => "Minting...",
            MintStatus::Succeeded | MintStatus::Failed => "Finishing...",
        };
        let can_mint = !busy && self.contract_configured;
        if ui
            .add_enabled(
                can_mint,
                egui::Button::new(label).min_size(egui::vec2(160.0, 32.0)),
            )
            .clicked()
        {
            dispatch_backend_command(&self.cmd_tx, BackendCommand::SubmitMint, &mut self.status);
        }
        if !self.contract_configured {
            ui.add_space(8.0);
            ui.small("Minting disabled: no contract address configured.");
        }
    }

    fn show_toasts(&mut self, ctx: &egui::Context) {
        egui::Area::new(egui::Id::new("mint_toasts"))
            .anchor(egui::Align2::RIGHT_TOP, egui::vec2(-12.0, 36.0))
            .show(ctx, |ui| {
                ui.set_max_width(TOAST_WIDTH);
                for toast in &self.toasts {
                    let accent = toast_color(toast.notice.kind);
                    egui::Frame::group(ui.style())
                        .fill(ui.visuals().extreme_bg_color)
                        .stroke(egui::Stroke::new(1.5, accent))
                        .show(ui, |ui| {
                            ui.set_width(TOAST_WIDTH);
                            ui.label(
                                egui::RichText::new(&toast.notice.title).color(accent).strong(),
                            );
                            if let Some(body) = &toast.notice.body {
                                ui.small(body);
                            }
                        });
                    ui.add_space(6.0);
                }
            });
    }
}

fn toast_color(kind: NoticeKind) -> egui::Color32 {
    match kind {
        NoticeKind::Info => egui::Color32::from_rgb(90, 160, 255),
        NoticeKind::Success => egui::Color32::from_rgb(80, 200, 120),
        NoticeKind::Warning => egui::Color32::from_rgb(230, 180, 60),
        NoticeKind::Error => egui::Color32::from_rgb(230, 90, 90),
    }
}

impl eframe::App for MintApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_ui_events();

        match self.view_state {
            AppViewState::Startup => self.show_startup_screen(ctx),
            AppViewState::Mint => self.show_mint_screen(ctx),
        }

        if self.mint_status != MintStatus::Idle || !self.toasts.is_empty() {
            ctx.request_repaint_after(Duration::from_millis(100));
        } else {
            ctx.request_repaint_after(Duration::from_millis(250));
        }
    }
}
