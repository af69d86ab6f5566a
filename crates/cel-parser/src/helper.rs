use cel_ast::ExprId;
use cel_macros::ExprHelper;
use indexmap::IndexMap;

/// Allocates expression ids and remembers the offset each was taken at.
#[derive(Debug, Default)]
pub(crate) struct IdAllocator {
    last: ExprId,
    positions: IndexMap<ExprId, u32>,
}

impl IdAllocator {
    pub fn id(&mut self, offset: u32) -> ExprId {
        self.last += 1;
        self.positions.insert(self.last, offset);
        self.last
    }

    pub fn offset(&self, id: ExprId) -> Option<u32> {
        self.positions.get(&id).copied()
    }

    pub fn into_positions(self) -> IndexMap<ExprId, u32> {
        self.positions
    }
}

/// Hands out ids for a macro expansion, all positioned at the call.
pub(crate) struct MacroIds<'a> {
    pub ids: &'a mut IdAllocator,
    pub offset: u32,
}

impl ExprHelper for MacroIds<'_> {
    fn next_id(&mut self) -> ExprId {
        self.ids.id(self.offset)
    }
}
