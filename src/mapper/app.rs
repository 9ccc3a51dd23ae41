//! ROI标注窗口
//! 左键添加顶点 | 右键结束多边形 | s 保存 | c 清除当前 | r 全部重置 | q 退出

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ab_glyph::FontArc;
use anyhow::Result;
use egui_macroquad::egui;
use image::{DynamicImage, RgbImage, RgbaImage};
use macroquad::prelude::*;

use super::MapperState;
use crate::overlay::{self, RegionStyle};
use crate::renderer::{self, FrameTexture, FrameView, HUD_FONT_SIZE};
use crate::roi::persist::{save_session, session_folder_name};
use crate::roi::{FrameSize, Point};

pub const INSTRUCTIONS: [&str; 2] = [
    "Left click: Add point | Right click: Finish polygon",
    "Press 's': Save | 'c': Clear current | 'r': Reset all | 'q': Quit",
];

pub struct MapperApp {
    state: MapperState,
    frame: RgbImage,
    texture: FrameTexture,
    texture_dirty: bool,
    font: Option<FontArc>,

    video_file: String,
    timestamp: String,
    output_root: PathBuf,
    folder_name: String,

    quit: Arc<AtomicBool>,
    egui_wants_keyboard: bool,
    egui_wants_pointer: bool,
    prompt_error: Option<String>,
}

impl MapperApp {
    pub fn new(
        video: PathBuf,
        frame: RgbaImage,
        output_root: PathBuf,
        font: Option<FontArc>,
        quit: Arc<AtomicBool>,
    ) -> Self {
        // 会话时间戳在启动时确定, 同一会话多次保存覆盖同一目录
        let timestamp = crate::gen_time_string("_");
        let folder_name = session_folder_name(&video, &timestamp);
        let video_file = video
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| video.display().to_string());

        Self {
            state: MapperState::new(),
            frame: DynamicImage::ImageRgba8(frame).to_rgb8(),
            texture: FrameTexture::default(),
            texture_dirty: true,
            font,
            video_file,
            timestamp,
            output_root,
            folder_name,
            quit,
            egui_wants_keyboard: false,
            egui_wants_pointer: false,
            prompt_error: None,
        }
    }

    pub fn frame_size(&self) -> FrameSize {
        FrameSize {
            width: self.frame.width(),
            height: self.frame.height(),
        }
    }

    pub fn print_instructions() {
        log::info!("📝 ROI Polygon Mapper Instructions:");
        log::info!("  - Left click: Add point to current polygon");
        log::info!("  - Right click: Finish current polygon (minimum 3 points)");
        log::info!("  - Press 's': Save all polygons");
        log::info!("  - Press 'c': Clear current polygon");
        log::info!("  - Press 'r': Reset all polygons");
        log::info!("  - Press 'q': Quit");
    }

    /// 保存全部多边形; 没有多边形时不写任何文件
    pub fn save(&self) -> Result<Option<PathBuf>> {
        if !self.state.should_autosave() {
            log::warn!("⚠️ No polygons to save!");
            return Ok(None);
        }
        let session = self
            .state
            .to_session(&self.timestamp, &self.video_file, self.frame_size())?;
        let dir = save_session(
            &self.output_root,
            &self.folder_name,
            &session,
            &self.frame,
            self.font.as_ref(),
        )?;
        for region in session.regions() {
            log::info!("  {}: {} points", region.name(), region.points().len());
        }
        Ok(Some(dir))
    }

    fn save_and_report(&self) {
        if let Err(e) = self.save() {
            log::error!("❌ 保存失败: {:#}", e);
        }
    }

    /// 退出时自动保存
    fn finish(&self) {
        if self.state.should_autosave() {
            log::info!("💾 Auto-saving polygons before quit...");
            self.save_and_report();
        } else {
            log::info!("No polygons to save.");
        }
    }

    /// 已完成的多边形 (半透明填充 + 边框) 合成到帧纹理
    fn refresh_texture(&mut self) {
        let mut composite = self.frame.clone();
        overlay::draw_regions(
            &mut composite,
            self.state.regions(),
            RegionStyle::annotated(),
            None,
            overlay::palette_color,
        );
        let rgba = DynamicImage::ImageRgb8(composite).to_rgba8();
        self.texture.update(&rgba);
        self.texture_dirty = false;
    }

    /// 处理键盘/鼠标; 返回 true 表示退出
    fn handle_input(&mut self, view: &FrameView) -> bool {
        if !self.egui_wants_pointer && !self.state.is_naming() {
            if is_mouse_button_pressed(MouseButton::Left) {
                let (mx, my) = mouse_position();
                if let Some(p) = view.to_frame(mx, my) {
                    self.state.add_point(p);
                }
            }
            if is_mouse_button_pressed(MouseButton::Right) && self.state.begin_finish().is_ok() {
                self.prompt_error = None;
            }
        }

        if self.egui_wants_keyboard || self.state.is_naming() {
            return false;
        }
        if is_key_pressed(KeyCode::Q) {
            return true;
        }
        if is_key_pressed(KeyCode::S) {
            self.save_and_report();
        }
        if is_key_pressed(KeyCode::C) {
            self.state.clear_current();
        }
        if is_key_pressed(KeyCode::R) {
            self.state.reset_all();
            self.texture_dirty = true;
        }
        false
    }

    /// 预览线 + 鼠标坐标: 只在绘制多边形且鼠标在帧内时显示, 返回 (鼠标帧坐标, 最后一个顶点)
    fn cursor_preview(&self, view: &FrameView, mx: f32, my: f32) -> Option<(Point, Point)> {
        let last = *self.state.current().last()?;
        Some((view.to_frame(mx, my)?, last))
    }

    fn draw(&self, view: &FrameView) {
        clear_background(BLACK);
        self.texture.draw(view);

        for (i, region) in self.state.regions().iter().enumerate() {
            let anchor = view.point_to_screen(region.label_anchor());
            draw_text(
                region.name(),
                anchor.x,
                anchor.y - 8.0,
                HUD_FONT_SIZE + 6.0,
                renderer::palette(i),
            );
        }

        // 当前多边形: 顶点 + 边 + 到鼠标的预览线
        let current = self.state.current();
        renderer::draw_polyline(view, current, false, 2.0, RED);
        for p in current {
            let s = view.point_to_screen(*p);
            draw_circle(s.x, s.y, 4.0, RED);
        }
        let (mx, my) = mouse_position();
        if let Some((p, last)) = self.cursor_preview(view, mx, my) {
            if !self.state.is_naming() {
                let s = view.point_to_screen(last);
                draw_line(s.x, s.y, mx, my, 1.0, YELLOW);
            }
            draw_text(
                &format!("Mouse: {}", p),
                mx + 10.0,
                my - 10.0,
                18.0,
                WHITE,
            );
        }

        let mut hud: Vec<String> = INSTRUCTIONS.iter().map(|s| s.to_string()).collect();
        hud.push(format!("Current polygon: {} points", current.len()));
        hud.push(format!("Completed polygons: {}", self.state.regions().len()));
        renderer::draw_hud(&hud);
    }

    /// egui 命名对话框
    fn draw_prompt(&mut self) {
        let mut committed = false;
        egui_macroquad::ui(|ctx| {
            self.egui_wants_keyboard = ctx.wants_keyboard_input();
            self.egui_wants_pointer = ctx.wants_pointer_input();
            if !self.state.is_naming() {
                return;
            }

            let default_name = self.state.default_name();
            egui::Window::new("Polygon name")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label(format!(
                        "Enter name for this polygon ({} points):",
                        self.state.current().len()
                    ));
                    let edit = ui.add(
                        egui::TextEdit::singleline(&mut self.state.name_input)
                            .hint_text(default_name.as_str()),
                    );
                    edit.request_focus();
                    if let Some(err) = &self.prompt_error {
                        ui.colored_label(egui::Color32::RED, err);
                    }

                    let enter = ui.input(|i| i.key_pressed(egui::Key::Enter));
                    let escape = ui.input(|i| i.key_pressed(egui::Key::Escape));
                    ui.horizontal(|ui| {
                        let ok = ui.button("OK").clicked();
                        let cancel = ui.button("Cancel").clicked();
                        if ok || enter {
                            let input = self.state.name_input.clone();
                            match self.state.commit_name(&input) {
                                Ok(_) => {
                                    self.prompt_error = None;
                                    committed = true;
                                }
                                Err(e) => self.prompt_error = Some(e.to_string()),
                            }
                        } else if cancel || escape {
                            self.state.cancel_naming();
                            self.prompt_error = None;
                        }
                    });
                });
        });
        egui_macroquad::draw();

        if committed {
            self.texture_dirty = true;
        }
    }

    /// 主循环 (macroquad)
    pub async fn run(mut self) {
        prevent_quit();
        loop {
            if is_quit_requested() || self.quit.load(Ordering::Relaxed) {
                break;
            }
            if self.texture_dirty {
                self.refresh_texture();
            }

            let view = FrameView::fit(
                self.frame.width(),
                self.frame.height(),
                screen_width(),
                screen_height(),
            );
            if self.handle_input(&view) {
                break;
            }
            self.draw(&view);
            self.draw_prompt();

            next_frame().await;
        }

        self.finish();
        log::info!("👋 ROI标注结束");
    }
}
