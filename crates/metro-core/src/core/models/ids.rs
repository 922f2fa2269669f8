use serde::{Deserialize, Serialize};

macro_rules! index_type {
    ($($(#[$meta:meta])* $vis:vis struct $name:ident;)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
            #[serde(transparent)]
            $vis struct $name(pub usize);

            impl $name {
                #[inline]
                pub fn index(self) -> usize {
                    self.0
                }
            }
        )*
    };
}

index_type! {
    /// Index into the topology's atom type table.
    pub struct AtomTypeId;
    /// Index into the topology's molecule kind table.
    pub struct MoleculeKindId;
}
