//! Retained in-world UI: named containers holding text nodes.

use glam::{Quat, Vec3};
use tracing::{debug, warn};

const DEFAULT_FONT_SIZE: f32 = 0.05;
const DEFAULT_CONTAINER_HEIGHT: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerHandle(usize);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutOptions {
    pub height: f32,
    pub width: Option<f32>,
    pub position: Vec3,
    pub rotation: Quat,
    pub background_opacity: f32,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            height: DEFAULT_CONTAINER_HEIGHT,
            width: None,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            background_opacity: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub font_size: f32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: DEFAULT_FONT_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    pub content: String,
    pub style: TextStyle,
}

#[derive(Debug, Clone)]
pub struct Container {
    pub id: String,
    pub layout: LayoutOptions,
    pub children: Vec<TextNode>,
    pub visible: bool,
}

impl Container {
    pub fn text(&self) -> String {
        self.children
            .iter()
            .map(|node| node.content.as_str())
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct UiLayer {
    containers: Vec<Container>,
}

impl UiLayer {
    /// Creates a hidden, empty container. Reusing an id resets that
    /// container instead of creating a second one.
    pub fn create_container(&mut self, id: &str, layout: LayoutOptions) -> ContainerHandle {
        if let Some(handle) = self.find(id) {
            warn!(container = id, "ui_container_recreated");
            let container = &mut self.containers[handle.0];
            container.layout = layout;
            container.children.clear();
            container.visible = false;
            return handle;
        }
        self.containers.push(Container {
            id: id.to_string(),
            layout,
            children: Vec::new(),
            visible: false,
        });
        ContainerHandle(self.containers.len() - 1)
    }

    pub fn create_text(&self, content: impl Into<String>, style: TextStyle) -> TextNode {
        TextNode {
            content: content.into(),
            style,
        }
    }

    pub fn append_child(&mut self, container: ContainerHandle, node: TextNode) -> bool {
        match self.containers.get_mut(container.0) {
            Some(target) => {
                target.children.push(node);
                true
            }
            None => false,
        }
    }

    pub fn show(&mut self, container: ContainerHandle) {
        self.set_visible(container, true);
    }

    pub fn hide(&mut self, container: ContainerHandle) {
        self.set_visible(container, false);
    }

    fn set_visible(&mut self, container: ContainerHandle, visible: bool) {
        if let Some(target) = self.containers.get_mut(container.0) {
            target.visible = visible;
            debug!(container = %target.id, visible, "ui_visibility_changed");
        }
    }

    pub fn container(&self, handle: ContainerHandle) -> Option<&Container> {
        self.containers.get(handle.0)
    }

    pub fn find(&self, id: &str) -> Option<ContainerHandle> {
        self.containers
            .iter()
            .position(|container| container.id == id)
            .map(ContainerHandle)
    }

    pub fn visible_count(&self) -> usize {
        self.containers
            .iter()
            .filter(|container| container.visible)
            .count()
    }
}
