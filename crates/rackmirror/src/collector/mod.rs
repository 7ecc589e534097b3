//! Snapshotting host state into the model
//!
//! Collection never fails halfway: a missing asset or colour is replaced by a
//! default and logged, and only a module without a resolvable panel is
//! skipped outright.

pub mod assets;
pub mod panel;

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::geometry::{Rect, Vec2};
use crate::host::{GraphHost, HostError, LightDescriptor, ParamDescriptor, PortDescriptor};
use crate::model::{
    light_id, menu_path, Cable, Display, Light, MenuId, MenuItem, Module, ModuleId, ModuleMenus,
    Param, ParamId, ParamState, Port,
};

/// Model slug of our own bridge module inside the host; never mirrored
pub const COMPANION_MODEL: &str = "OSCctrl";

/// Read-only view over a host, converting host pixels to centimetres
pub struct Collector<'a, H: GraphHost + ?Sized> {
    host: &'a H,
    px_per_cm: f32,
}

impl<'a, H: GraphHost + ?Sized> Collector<'a, H> {
    pub fn new(host: &'a H) -> Self {
        Self {
            host,
            px_per_cm: host.px_per_cm(),
        }
    }

    fn cm(&self, rect: Rect) -> Rect {
        rect.to_cm(self.px_per_cm)
    }

    /// Full snapshot of one module, or `None` if it is gone, is the
    /// companion module, or has no panel.
    pub fn collect_module(&self, id: ModuleId, return_id: Option<i64>) -> Option<Module> {
        let desc = self.host.module(id)?;
        if desc.model == COMPANION_MODEL {
            debug!("skipping companion module {}", id);
            return None;
        }

        let Some((resolver, panel)) = panel::resolve_panel(&desc) else {
            warn!(
                "module {} ({}/{}) has no resolvable panel, skipping",
                id, desc.plugin, desc.model
            );
            return None;
        };
        debug!("module {} panel resolved by {}", id, resolver);

        let body_color = self.host.dominant_color(&panel.svg).unwrap_or_else(|e| {
            warn!("module {} panel colour: {}, using default", id, e);
            assets::DEFAULT_PANEL_COLOR
        });

        let mut module = Module {
            id,
            plugin: desc.plugin,
            model: desc.model,
            brand: desc.brand,
            name: desc.name,
            description: desc.description,
            rect: self.cm(Rect {
                pos: desc.rect.pos,
                size: panel.rect.size,
            }),
            panel_svg: panel.svg,
            body_color,
            left_expander: desc.left_expander,
            right_expander: desc.right_expander,
            return_id,
            ..Default::default()
        };

        for param in self.host.params(id) {
            let param = self.param(id, module.rect.size, param);
            module.params.insert(param.id, param);
        }

        for port in self.host.ports(id) {
            let kind = port.kind;
            let port = self.port(id, module.rect.size, port);
            module.ports_mut(kind).insert(port.id, port);
        }

        for light in self.host.lights(id) {
            self.light(&mut module, light);
        }

        for display in self.host.displays(id) {
            module.displays.insert(
                display.index,
                Display {
                    index: display.index,
                    rect: self.cm(display.rect).centred_in(module.rect.size),
                    synced: false,
                },
            );
        }

        module.rebuild_param_lights();
        debug_assert!(module.light_index_consistent());

        debug!(
            "collected module {} {}: {} params, {} inputs, {} outputs, {} lights",
            id,
            module.name,
            module.params.len(),
            module.inputs.len(),
            module.outputs.len(),
            module.lights.len()
        );
        Some(module)
    }

    fn param(&self, module_id: ModuleId, parent: Vec2, desc: ParamDescriptor) -> Param {
        let rect = self.cm(desc.rect).centred_in(parent);

        let frames = match self.host.param_assets(module_id, desc.id) {
            Ok(frames) if !frames.is_empty() => frames,
            result => {
                if let Err(e) = result {
                    warn!(
                        "param {}:{} ({}) assets: {}, using defaults",
                        module_id, desc.id, desc.name, e
                    );
                }
                let positions = assets::switch_positions(desc.min, desc.max);
                assets::default_param_svgs(desc.kind, rect.size.x, positions)
            }
        };

        Param {
            id: desc.id,
            kind: desc.kind,
            name: desc.name,
            unit: desc.unit,
            description: desc.description,
            display_value: desc.display_value,
            rect,
            min: desc.min,
            max: desc.max,
            default: desc.default,
            value: desc.value,
            snap: desc.snap,
            min_angle: desc.min_angle,
            max_angle: desc.max_angle,
            handle: self.cm(desc.handle).centred_in(rect.size),
            min_handle: desc.min_handle.to_cm(self.px_per_cm),
            max_handle: desc.max_handle.to_cm(self.px_per_cm),
            horizontal: desc.horizontal,
            speed: desc.speed,
            latch: desc.latch,
            momentary: desc.momentary,
            frames,
            visible: desc.visible,
            synced: false,
            light_ids: Default::default(),
        }
    }

    fn port(&self, module_id: ModuleId, parent: Vec2, desc: PortDescriptor) -> Port {
        let svg = self
            .host
            .port_asset(module_id, desc.kind, desc.id)
            .unwrap_or_else(|e| {
                warn!("port {}:{} asset: {}, using default", module_id, desc.id, e);
                assets::DEFAULT_PORT_SVG.to_string()
            });
        let color = self.host.dominant_color(&svg).unwrap_or_else(|e| {
            warn!("port {}:{} colour: {}, using default", module_id, desc.id, e);
            assets::DEFAULT_PORT_COLOR
        });

        Port {
            id: desc.id,
            name: desc.name,
            description: desc.description,
            rect: self.cm(desc.rect).centred_in(parent),
            svg,
            color,
            visible: desc.visible,
            synced: false,
        }
    }

    /// Param lights sit relative to their param; a light naming a param the
    /// module doesn't have is treated as a module light.
    fn light(&self, module: &mut Module, desc: LightDescriptor) {
        let id = light_id(desc.key);
        let rect = self.cm(desc.rect);
        let module_size = module.rect.size;

        let (param_id, rect) = match desc.param_id.and_then(|p| module.params.get_mut(&p)) {
            Some(param) => {
                param.light_ids.insert(id);
                (Some(param.id), rect.centred_in(param.rect.size))
            }
            None => (None, rect.centred_in(module_size)),
        };

        module.lights.insert(
            id,
            Light {
                id,
                host_key: desc.key,
                module_id: module.id,
                param_id,
                rect,
                shape: desc.shape,
                color: desc.color,
                bg_color: desc.bg_color,
                visible: desc.visible,
                synced: false,
            },
        );
    }

    /// Param values, visibility and display strings only
    pub fn collect_module_shallow(&self, id: ModuleId) -> Option<BTreeMap<ParamId, ParamState>> {
        self.host.module(id)?;
        Some(
            self.host
                .params(id)
                .into_iter()
                .map(|p| {
                    (
                        p.id,
                        ParamState {
                            id: p.id,
                            value: p.value,
                            visible: p.visible,
                            display_value: p.display_value,
                        },
                    )
                })
                .collect(),
        )
    }

    pub fn collect_cable(&self, id: i64) -> Option<Cable> {
        let desc = self.host.cable(id)?;
        Some(Cable {
            id: desc.id,
            input_module_id: desc.input_module,
            output_module_id: desc.output_module,
            input_port_id: desc.input_port,
            output_port_id: desc.output_port,
            color: desc.color,
            synced: false,
        })
    }
}

/// Closes the host's context menu when dropped
struct MenuGuard<'a, H: GraphHost + ?Sized> {
    host: &'a mut H,
}

impl<H: GraphHost + ?Sized> Drop for MenuGuard<'_, H> {
    fn drop(&mut self) {
        self.host.close_menu();
    }
}

/// Open `menu_id` of a module by replaying its path, run `f` on it, and
/// close the menu again whatever `f` returns.
pub fn with_menu<H, T>(
    host: &mut H,
    module_id: ModuleId,
    menus: &ModuleMenus,
    menu_id: MenuId,
    f: impl FnOnce(&mut H) -> Result<T, HostError>,
) -> Result<T, HostError>
where
    H: GraphHost + ?Sized,
{
    let path = menu_path(menus, menu_id).ok_or(HostError::NotFound {
        kind: "menu",
        id: i64::from(menu_id),
    })?;

    host.open_module_menu(module_id)?;
    let mut guard = MenuGuard { host };
    for index in path {
        guard.host.open_submenu(index)?;
    }
    f(&mut *guard.host)
}

/// Snapshot the items of a (sub)menu
pub fn collect_menu<H: GraphHost + ?Sized>(
    host: &mut H,
    module_id: ModuleId,
    menus: &ModuleMenus,
    menu_id: MenuId,
) -> Result<Vec<MenuItem>, HostError> {
    with_menu(host, module_id, menus, menu_id, |h| h.menu_items())
}
