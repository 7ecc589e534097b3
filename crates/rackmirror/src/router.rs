//! Inbound message routing
//!
//! Command addresses parse into [`InboundRequest`]s. Everything else is
//! looked up in a table of `(outer id, inner id, value)` routes: the
//! renderer's acknowledgements, diff requests and param writes.
//!
//! Nothing here calls the host. Work for the host is queued in the pending
//! sets and picked up by the render thread on its next tick.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use rackproto::address::{ack, command};
use rackproto::{OscError, OscMessage};
use tracing::{debug, info, warn};

use crate::geometry::Vec2;
use crate::model::{CableId, ModuleId, PortKind};
use crate::pending::{
    Arrangement, CableCreate, Favorite, MenuClick, MenuQuantity, MenuRequest, ModuleCreate,
    ParamUpdate,
};
use crate::state::SyncState;
use crate::transport::PacketSink;

#[derive(Debug, Clone, PartialEq)]
pub enum InboundRequest {
    Sync,
    CreateModule(ModuleCreate),
    DestroyModules(Vec<ModuleId>),
    CreateCable(CableCreate),
    DestroyCable(CableId),
    GetMenu(MenuRequest),
    ClickMenuItem(MenuClick),
    UpdateMenuQuantity(MenuQuantity),
    Favorite(Favorite),
    Arrange(Arrangement),
    LoadPatch(Option<PathBuf>),
    AutosaveAndExit,
    SetServerPort(u16),
}

/// -1 (or any negative id) means "none"
fn optional_id(id: i32) -> Option<i32> {
    (id >= 0).then_some(id)
}

impl InboundRequest {
    /// `Ok(None)` when the address is not a command
    pub fn parse(msg: &OscMessage) -> Result<Option<Self>, OscError> {
        let request = match msg.address.as_str() {
            command::SYNC => Self::Sync,
            command::CREATE_MODULE => {
                let position = if msg.args.len() >= 5 {
                    Some(Vec2::new(msg.arg_f32(3)?, msg.arg_f32(4)?))
                } else {
                    None
                };
                Self::CreateModule(ModuleCreate {
                    plugin: msg.arg_str(0)?.to_string(),
                    model: msg.arg_str(1)?.to_string(),
                    return_id: msg.arg_i64(2)?,
                    position,
                })
            }
            command::DESTROY_MODULE => {
                if msg.args.is_empty() {
                    msg.arg_i64(0)?;
                }
                let ids = (0..msg.args.len())
                    .map(|i| msg.arg_i64(i))
                    .collect::<Result<Vec<_>, _>>()?;
                Self::DestroyModules(ids)
            }
            command::CREATE_CABLE => Self::CreateCable(CableCreate {
                input_module: msg.arg_i64(0)?,
                output_module: msg.arg_i64(1)?,
                input_port: msg.arg_i32(2)?,
                output_port: msg.arg_i32(3)?,
            }),
            command::DESTROY_CABLE => Self::DestroyCable(msg.arg_i64(0)?),
            command::GET_MENU => {
                let parent_menu = optional_id(msg.arg_i32(2)?);
                Self::GetMenu(MenuRequest {
                    module: msg.arg_i64(0)?,
                    menu: msg.arg_i32(1)?,
                    parent_menu,
                    parent_item_index: parent_menu.and(optional_id(msg.arg_i32(3)?)),
                })
            }
            command::CLICK_MENU_ITEM => Self::ClickMenuItem(MenuClick {
                module: msg.arg_i64(0)?,
                menu: msg.arg_i32(1)?,
                item_index: msg.arg_i32(2)?,
            }),
            command::UPDATE_MENU_ITEM_QUANTITY => Self::UpdateMenuQuantity(MenuQuantity {
                module: msg.arg_i64(0)?,
                menu: msg.arg_i32(1)?,
                item_index: msg.arg_i32(2)?,
                value: msg.arg_f32(3)?,
            }),
            command::FAVORITE => Self::Favorite(Favorite {
                plugin: msg.arg_str(0)?.to_string(),
                model: msg.arg_str(1)?.to_string(),
                favorite: msg.arg_bool(2)?,
            }),
            command::ARRANGE_MODULES => Self::Arrange(Arrangement {
                left: msg.arg_i64(0)?,
                right: msg.arg_i64(1)?,
                attach: msg.arg_bool(2)?,
            }),
            command::LOAD_PATCH => {
                let path = match msg.args.first() {
                    Some(_) => Some(msg.arg_str(0)?).filter(|p| !p.is_empty()),
                    None => None,
                };
                Self::LoadPatch(path.map(PathBuf::from))
            }
            command::AUTOSAVE_AND_EXIT => Self::AutosaveAndExit,
            command::SET_SERVER_PORT => {
                let port = msg.arg_i32(0)?;
                let port = u16::try_from(port).map_err(|_| OscError::ArgumentType {
                    address: msg.address.clone(),
                    index: 0,
                    expected: "port number",
                })?;
                Self::SetServerPort(port)
            }
            _ => return Ok(None),
        };
        Ok(Some(request))
    }
}

/// Arguments of a table route; inner id and value default to zero when the
/// route does not require them
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteArgs {
    pub outer: i64,
    pub inner: i32,
    pub value: f32,
}

impl RouteArgs {
    /// Fails with `MissingArgument` when fewer than `arity` arguments arrived
    pub fn parse(msg: &OscMessage, arity: usize) -> Result<Self, OscError> {
        if msg.args.len() < arity.max(1) {
            return Err(OscError::MissingArgument {
                address: msg.address.clone(),
                expected: arity.max(1),
                actual: msg.args.len(),
            });
        }
        let outer = msg.arg_i64(0)?;
        let inner = match msg.args.len() {
            0 | 1 => 0,
            _ => msg.arg_i32(1)?,
        };
        let value = match msg.args.len() {
            0..=2 => 0.0,
            _ => msg.arg_f32(2)?,
        };
        Ok(Self {
            outer,
            inner,
            value,
        })
    }
}

type RouteHandler = fn(&SyncState, RouteArgs);

#[derive(Clone, Copy)]
struct Route {
    arity: usize,
    handler: RouteHandler,
}

fn route(arity: usize, handler: RouteHandler) -> Route {
    Route { arity, handler }
}

fn route_table() -> HashMap<&'static str, Route> {
    let mut routes = HashMap::new();
    routes.insert(ack::MODULE, route(1, |s, a| {
        s.ack_module(a.outer);
    }));
    routes.insert(ack::PARAM, route(2, |s, a| {
        s.ack_param(a.outer, a.inner);
    }));
    routes.insert(ack::INPUT, route(2, |s, a| {
        s.ack_port(PortKind::Input, a.outer, a.inner);
    }));
    routes.insert(ack::OUTPUT, route(2, |s, a| {
        s.ack_port(PortKind::Output, a.outer, a.inner);
    }));
    routes.insert(ack::MODULE_LIGHT, route(2, |s, a| {
        s.ack_light(a.outer, a.inner);
    }));
    routes.insert(ack::DISPLAY, route(2, |s, a| {
        s.ack_display(a.outer, a.inner);
    }));
    routes.insert(ack::CABLE, route(1, |s, a| {
        s.ack_cable(a.outer);
    }));
    routes.insert(ack::DIFF_MODULE, route(1, |s, a| s.pending.mark_dirty(a.outer)));
    routes.insert(ack::UPDATE_PARAM, route(3, |s, a| {
        s.pending.param_updates.push(ParamUpdate {
            module: a.outer,
            param: a.inner,
            value: a.value,
        })
    }));
    routes
}

/// Turns inbound messages into state changes and pending host work
#[derive(Clone)]
pub struct Router {
    state: Arc<SyncState>,
    sink: Arc<dyn PacketSink>,
    routes: Arc<HashMap<&'static str, Route>>,
}

impl Router {
    pub fn new(state: Arc<SyncState>, sink: Arc<dyn PacketSink>) -> Self {
        Self {
            state,
            sink,
            routes: Arc::new(route_table()),
        }
    }

    pub fn state(&self) -> &Arc<SyncState> {
        &self.state
    }

    pub fn dispatch(&self, msg: &OscMessage) {
        match InboundRequest::parse(msg) {
            Ok(Some(request)) => self.apply(request),
            Ok(None) => match self.routes.get(msg.address.as_str()) {
                Some(route) => match RouteArgs::parse(msg, route.arity) {
                    Ok(args) => (route.handler)(&self.state, args),
                    Err(e) => warn!("dropping {}: {}", msg.address, e),
                },
                None => debug!("no route for {}", msg.address),
            },
            Err(e) => warn!("dropping malformed {}: {}", msg.address, e),
        }
    }

    pub fn apply(&self, request: InboundRequest) {
        debug!("inbound request {:?}", request);
        let pending = &self.state.pending;
        match request {
            InboundRequest::Sync => self.state.request_full_sync(),
            InboundRequest::CreateModule(create) => pending.module_creates.push(create),
            InboundRequest::DestroyModules(ids) => {
                for id in ids {
                    pending.module_destroys.push(id);
                }
            }
            InboundRequest::CreateCable(create) => pending.cable_creates.push(create),
            InboundRequest::DestroyCable(id) => pending.cable_destroys.push(id),
            InboundRequest::GetMenu(request) => pending.menu_requests.push(request),
            InboundRequest::ClickMenuItem(click) => pending.menu_clicks.push(click),
            InboundRequest::UpdateMenuQuantity(update) => pending.menu_quantities.push(update),
            InboundRequest::Favorite(favorite) => pending.favorites.push(favorite),
            InboundRequest::Arrange(arrangement) => pending.arrangements.push(arrangement),
            InboundRequest::LoadPatch(path) => pending.patch_loads.push(path),
            InboundRequest::AutosaveAndExit => {
                info!("peer requested autosave and exit");
                self.state.exit_requested.store(true, Ordering::SeqCst);
            }
            InboundRequest::SetServerPort(port) => {
                self.sink.set_peer_port(port);
                self.state.request_full_sync();
            }
        }
    }
}
