//! Optional kind-compatibility rules for parent assignment

use crate::error::{DesignError, Result};
use crate::model::NodeKind;
use serde::{Deserialize, Serialize};

/// Which parent/child kind pairings `set_parent` accepts.
///
/// The structural invariants (no cycles, no dangling parents) hold under every
/// policy; this layer only adds semantic checks on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContainmentPolicy {
    /// Any kind may contain any kind.
    #[default]
    Structural,
    /// VPCs contain subnets, subnets contain services. Nothing else nests.
    Strict,
}

impl ContainmentPolicy {
    pub fn allows(self, parent: NodeKind, child: NodeKind) -> bool {
        match self {
            ContainmentPolicy::Structural => true,
            ContainmentPolicy::Strict => match parent {
                NodeKind::VpcEnvironment => child.is_subnet(),
                NodeKind::PublicSubnet | NodeKind::PrivateSubnet => child == NodeKind::Service,
                NodeKind::Service => false,
            },
        }
    }

    pub fn check(self, parent: NodeKind, child: NodeKind) -> Result<()> {
        if self.allows(parent, child) {
            Ok(())
        } else {
            Err(DesignError::ContainmentViolation { parent, child })
        }
    }
}
