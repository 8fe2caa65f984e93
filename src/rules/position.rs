//! Board state and the rules that govern it.
//!
//! A [`Position`] is a plain 8x8 grid plus the FEN side-channel fields. Moves
//! arrive in from/to form; callers that have already vetted a move use
//! [`Position::apply`], which trusts its input and handles castling, en
//! passant and promotion side effects. Callers holding user input go through
//! [`Position::illegal_reason`] first, which either clears the move or
//! explains in plain words why it cannot be played.

use super::types::{CastlingRights, Color, Move, Piece, PieceType, RulesError, Square};

/// Starting position in FEN form.
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

const KNIGHT_OFFSETS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];

const BISHOP_DIRS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const ROOK_DIRS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A complete game state. Cheap to clone; the variation tree stores one per
/// node rather than replaying move lists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Position {
    /// Indexed `grid[rank][file]`, rank 0 at the top (black's back rank).
    grid: [[Option<Piece>; 8]; 8],
    pub side_to_move: Color,
    pub castling: CastlingRights,
    pub en_passant: Option<Square>,
    pub halfmove_clock: u16,
    pub fullmove_number: u16,
}

impl Default for Position {
    fn default() -> Self {
        Position::starting()
    }
}

impl Position {
    /// The standard starting position.
    pub fn starting() -> Self {
        // START_FEN is a constant; parsing it cannot fail.
        Position::from_fen(START_FEN).unwrap_or_else(|_| unreachable!())
    }

    // -- accessors ----------------------------------------------------------

    #[inline]
    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        self.grid[sq.rank as usize][sq.file as usize]
    }

    #[inline]
    fn set_piece(&mut self, sq: Square, piece: Option<Piece>) {
        self.grid[sq.rank as usize][sq.file as usize] = piece;
    }

    /// Iterate every occupied square with its piece.
    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        (0..8u8).flat_map(move |rank| {
            (0..8u8).filter_map(move |file| {
                let sq = Square::new(file, rank);
                self.piece_at(sq).map(|p| (sq, p))
            })
        })
    }

    /// Locate the king of the given colour. A well-formed position always
    /// has one; on a corrupt board this returns `None`.
    pub fn king_square(&self, color: Color) -> Option<Square> {
        self.pieces()
            .find(|(_, p)| p.color == color && p.kind == PieceType::King)
            .map(|(sq, _)| sq)
    }

    /// Whether `color`'s king is currently attacked.
    pub fn in_check(&self, color: Color) -> bool {
        match self.king_square(color) {
            Some(sq) => self.is_attacked(sq, !color),
            None => false,
        }
    }

    // -- attack detection ---------------------------------------------------

    /// Whether any piece of `by` attacks `sq`. Sliders are found by scanning
    /// outward along each ray until a piece or the board edge; knights, kings
    /// and pawns are checked by direct offset.
    pub fn is_attacked(&self, sq: Square, by: Color) -> bool {
        // Knights.
        for (df, dr) in KNIGHT_OFFSETS {
            if let Some(from) = sq.offset(df, dr) {
                if self.piece_at(from)
                    == Some(Piece::new(by, PieceType::Knight))
                {
                    return true;
                }
            }
        }

        // Diagonal rays: bishop/queen at any distance, pawn and king at
        // distance one. Pawns attack toward decreasing rank index when
        // white (up the display), increasing when black.
        for (df, dr) in BISHOP_DIRS {
            let mut step = 1i8;
            loop {
                let Some(from) = sq.offset(df * step, dr * step) else {
                    break;
                };
                if let Some(p) = self.piece_at(from) {
                    if p.color == by {
                        match p.kind {
                            PieceType::Bishop | PieceType::Queen => return true,
                            PieceType::King if step == 1 => return true,
                            PieceType::Pawn if step == 1 => {
                                // A white pawn sits one rank below its
                                // target, a black pawn one rank above.
                                let attacks = match by {
                                    Color::White => dr == 1,
                                    Color::Black => dr == -1,
                                };
                                if attacks {
                                    return true;
                                }
                            }
                            _ => {}
                        }
                    }
                    break;
                }
                step += 1;
            }
        }

        // Orthogonal rays: rook/queen at any distance, king at distance one.
        for (df, dr) in ROOK_DIRS {
            let mut step = 1i8;
            loop {
                let Some(from) = sq.offset(df * step, dr * step) else {
                    break;
                };
                if let Some(p) = self.piece_at(from) {
                    if p.color == by {
                        match p.kind {
                            PieceType::Rook | PieceType::Queen => return true,
                            PieceType::King if step == 1 => return true,
                            _ => {}
                        }
                    }
                    break;
                }
                step += 1;
            }
        }

        false
    }

    /// Whether every square strictly between `from` and `to` is empty.
    /// `from` and `to` must share a rank, file or diagonal.
    fn path_clear(&self, from: Square, to: Square) -> bool {
        let df = (to.file as i8 - from.file as i8).signum();
        let dr = (to.rank as i8 - from.rank as i8).signum();
        let mut step = 1i8;
        loop {
            let Some(sq) = from.offset(df * step, dr * step) else {
                return true;
            };
            if sq == to {
                return true;
            }
            if self.piece_at(sq).is_some() {
                return false;
            }
            step += 1;
        }
    }

    // -- move application ---------------------------------------------------

    /// Apply `mv` without any legality checking, returning the successor
    /// position. The caller is trusted to have vetted the move; a nonsense
    /// move silently produces a nonsense position. Handles rook relocation
    /// on castling, en-passant removal, promotion (defaulting to queen when
    /// a pawn reaches the last rank with no suffix), castling-rights
    /// narrowing, clock maintenance and the side-to-move flip.
    pub fn apply(&self, mv: Move) -> Position {
        let mut next = self.clone();
        let us = self.side_to_move;
        let moving = self.piece_at(mv.from);

        let is_pawn = matches!(moving, Some(p) if p.kind == PieceType::Pawn);
        let is_king = matches!(moving, Some(p) if p.kind == PieceType::King);
        let mut capture = self.piece_at(mv.to).is_some();

        // En passant: a pawn moving diagonally onto an empty square removes
        // the pawn that sits beside the destination on the source rank.
        if is_pawn && mv.from.file != mv.to.file && self.piece_at(mv.to).is_none() {
            next.set_piece(Square::new(mv.to.file, mv.from.rank), None);
            capture = true;
        }

        // Castling: a two-file king move drags the rook to the far side.
        if is_king && mv.from.file.abs_diff(mv.to.file) == 2 {
            let rank = mv.from.rank;
            let (rook_from, rook_to) = if mv.to.file > mv.from.file {
                (Square::new(7, rank), Square::new(5, rank))
            } else {
                (Square::new(0, rank), Square::new(3, rank))
            };
            let rook = next.piece_at(rook_from);
            next.set_piece(rook_from, None);
            next.set_piece(rook_to, rook);
        }

        // Rights narrow whenever a move touches a king or rook home square,
        // whichever side moves.
        for sq in [mv.from, mv.to] {
            match (sq.file, sq.rank) {
                (4, 7) => {
                    next.castling.remove(CastlingRights::WHITE_KINGSIDE);
                    next.castling.remove(CastlingRights::WHITE_QUEENSIDE);
                }
                (0, 7) => next.castling.remove(CastlingRights::WHITE_QUEENSIDE),
                (7, 7) => next.castling.remove(CastlingRights::WHITE_KINGSIDE),
                (4, 0) => {
                    next.castling.remove(CastlingRights::BLACK_KINGSIDE);
                    next.castling.remove(CastlingRights::BLACK_QUEENSIDE);
                }
                (0, 0) => next.castling.remove(CastlingRights::BLACK_QUEENSIDE),
                (7, 0) => next.castling.remove(CastlingRights::BLACK_KINGSIDE),
                _ => {}
            }
        }

        // A double pawn push opens an en-passant square behind the pawn.
        next.en_passant = None;
        if is_pawn && mv.from.rank.abs_diff(mv.to.rank) == 2 {
            let between = (mv.from.rank + mv.to.rank) / 2;
            next.en_passant = Some(Square::new(mv.from.file, between));
        }

        // Move the piece, promoting a pawn that reaches the last rank.
        let landing = match moving {
            Some(p) if p.kind == PieceType::Pawn && (mv.to.rank == 0 || mv.to.rank == 7) => {
                Some(Piece::new(p.color, mv.promotion.unwrap_or(PieceType::Queen)))
            }
            other => other,
        };
        next.set_piece(mv.from, None);
        next.set_piece(mv.to, landing);

        if is_pawn || capture {
            next.halfmove_clock = 0;
        } else {
            next.halfmove_clock = self.halfmove_clock.saturating_add(1);
        }
        if us == Color::Black {
            next.fullmove_number = self.fullmove_number.saturating_add(1);
        }
        next.side_to_move = !us;
        next
    }

    // -- legality -----------------------------------------------------------

    /// Boolean view of [`Self::illegal_reason`].
    pub fn is_legal(&self, mv: Move) -> bool {
        self.illegal_reason(mv).is_none()
    }

    /// Full legality check. Returns `None` when `mv` is playable, otherwise
    /// a short human-readable reason suitable for showing to the user.
    pub fn illegal_reason(&self, mv: Move) -> Option<&'static str> {
        let us = self.side_to_move;
        let piece = match self.piece_at(mv.from) {
            Some(p) if p.color == us => p,
            _ => return Some("no piece of the side to move on the source square"),
        };
        if mv.from == mv.to {
            return Some("source and destination are the same square");
        }
        if matches!(self.piece_at(mv.to), Some(p) if p.color == us) {
            return Some("destination holds a friendly piece");
        }

        let dx = (mv.to.file as i8 - mv.from.file as i8).abs();
        let dy = mv.to.rank as i8 - mv.from.rank as i8;

        match piece.kind {
            PieceType::Knight => {
                if !((dx == 1 && dy.abs() == 2) || (dx == 2 && dy.abs() == 1)) {
                    return Some("not a knight move");
                }
            }
            PieceType::Bishop => {
                if dx != dy.abs() {
                    return Some("not a bishop move");
                }
                if !self.path_clear(mv.from, mv.to) {
                    return Some("path is blocked");
                }
            }
            PieceType::Rook => {
                if dx != 0 && dy != 0 {
                    return Some("not a rook move");
                }
                if !self.path_clear(mv.from, mv.to) {
                    return Some("path is blocked");
                }
            }
            PieceType::Queen => {
                if dx != 0 && dy != 0 && dx != dy.abs() {
                    return Some("not a queen move");
                }
                if !self.path_clear(mv.from, mv.to) {
                    return Some("path is blocked");
                }
            }
            PieceType::Pawn => {
                if let Some(reason) = self.illegal_pawn_reason(mv, us, dx, dy) {
                    return Some(reason);
                }
            }
            PieceType::King => {
                if dx <= 1 && dy.abs() <= 1 {
                    // Plain king step.
                } else if dy == 0 && dx == 2 {
                    if let Some(reason) = self.illegal_castling_reason(mv, us) {
                        return Some(reason);
                    }
                } else {
                    return Some("not a king move");
                }
            }
        }

        // Self-check is tested on the resulting position so castling's rook
        // relocation and en-passant removal are taken into account.
        if self.apply(mv).in_check(us) {
            return Some("leaves own king in check");
        }
        None
    }

    fn illegal_pawn_reason(&self, mv: Move, us: Color, dx: i8, dy: i8) -> Option<&'static str> {
        // White pawns march toward rank index 0, black toward 7.
        let forward: i8 = match us {
            Color::White => -1,
            Color::Black => 1,
        };
        let start_rank: u8 = match us {
            Color::White => 6,
            Color::Black => 1,
        };

        if dx > 1 {
            return Some("pawn cannot move that far sideways");
        }
        if dx == 1 {
            if dy != forward {
                return Some("pawn captures move one rank forward");
            }
            let target_occupied = self.piece_at(mv.to).is_some();
            if !target_occupied && self.en_passant != Some(mv.to) {
                return Some("pawn has nothing to capture");
            }
            return None;
        }

        // Straight push.
        if self.piece_at(mv.to).is_some() {
            return Some("pawn cannot capture straight ahead");
        }
        if dy == forward {
            return None;
        }
        if dy == forward * 2 && mv.from.rank == start_rank {
            if !self.path_clear(mv.from, mv.to) {
                return Some("path is blocked");
            }
            return None;
        }
        if mv.from.rank == start_rank {
            Some("pawn moves one or two ranks forward")
        } else {
            Some("pawn moves one rank forward")
        }
    }

    fn illegal_castling_reason(&self, mv: Move, us: Color) -> Option<&'static str> {
        let home_rank: u8 = match us {
            Color::White => 7,
            Color::Black => 0,
        };
        if mv.from != Square::new(4, home_rank) || mv.to.rank != home_rank {
            return Some("not a king move");
        }
        let kingside = mv.to.file > mv.from.file;
        let allowed = if kingside {
            self.castling.kingside(us)
        } else {
            self.castling.queenside(us)
        };
        if !allowed {
            return Some("castling rights lost on that side");
        }
        // Every square between king and rook must be empty. The b-file
        // square matters only for queenside and gets its own message.
        if kingside {
            for file in [5u8, 6] {
                if self.piece_at(Square::new(file, home_rank)).is_some() {
                    return Some("path is blocked");
                }
            }
        } else {
            for file in [2u8, 3] {
                if self.piece_at(Square::new(file, home_rank)).is_some() {
                    return Some("path is blocked");
                }
            }
            if self.piece_at(Square::new(1, home_rank)).is_some() {
                return Some("queenside castling blocked on the b-file");
            }
        }
        if self.in_check(us) {
            return Some("cannot castle out of check");
        }
        // The square the king passes through; the landing square is covered
        // by the final self-check test.
        let transit_file = if kingside { 5 } else { 3 };
        if self.is_attacked(Square::new(transit_file, home_rank), !us) {
            return Some("cannot castle through check");
        }
        None
    }

    /// All legal moves for the side to move. Built by filtering candidate
    /// destinations through [`Self::illegal_reason`]; plenty fast for a
    /// viewer that generates moves only on user input.
    pub fn legal_moves(&self) -> Vec<Move> {
        let mut out = Vec::new();
        for (from, piece) in self.pieces() {
            if piece.color != self.side_to_move {
                continue;
            }
            for rank in 0..8u8 {
                for file in 0..8u8 {
                    let to = Square::new(file, rank);
                    let mv = Move::new(from, to);
                    if self.illegal_reason(mv).is_none() {
                        if piece.kind == PieceType::Pawn && (rank == 0 || rank == 7) {
                            for promo in [
                                PieceType::Queen,
                                PieceType::Rook,
                                PieceType::Bishop,
                                PieceType::Knight,
                            ] {
                                out.push(Move::with_promotion(from, to, promo));
                            }
                        } else {
                            out.push(mv);
                        }
                    }
                }
            }
        }
        out
    }

    /// Whether the side to move has no legal move at all (mate or stalemate).
    pub fn no_moves(&self) -> bool {
        self.legal_moves().is_empty()
    }

    // -- FEN ----------------------------------------------------------------

    /// Parse a full six-field FEN string. Out-of-range input is rejected,
    /// never normalized.
    pub fn from_fen(fen: &str) -> Result<Position, RulesError> {
        let bad = |msg: &str| RulesError::InvalidFen(format!("{msg}: {fen}"));

        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(bad("expected 6 fields"));
        }

        let mut grid = [[None; 8]; 8];
        let ranks: Vec<&str> = fields[0].split('/').collect();
        if ranks.len() != 8 {
            return Err(bad("expected 8 ranks"));
        }
        for (rank, text) in ranks.iter().enumerate() {
            let mut file = 0usize;
            for c in text.chars() {
                if let Some(skip) = c.to_digit(10) {
                    if skip < 1 || skip > 8 {
                        return Err(bad("bad empty-square count"));
                    }
                    file += skip as usize;
                } else {
                    let piece = Piece::from_char(c).ok_or_else(|| bad("bad piece character"))?;
                    if file >= 8 {
                        return Err(bad("rank overflow"));
                    }
                    grid[rank][file] = Some(piece);
                    file += 1;
                }
            }
            if file != 8 {
                return Err(bad("rank does not span 8 files"));
            }
        }

        let side_to_move = match fields[1] {
            "w" => Color::White,
            "b" => Color::Black,
            _ => return Err(bad("side to move must be 'w' or 'b'")),
        };

        let castling =
            CastlingRights::from_fen(fields[2]).ok_or_else(|| bad("bad castling field"))?;

        let en_passant = match fields[3] {
            "-" => None,
            s => Some(Square::from_algebraic(s).ok_or_else(|| bad("bad en-passant square"))?),
        };

        let halfmove_clock = fields[4].parse().map_err(|_| bad("bad halfmove clock"))?;
        let fullmove_number: u16 = fields[5].parse().map_err(|_| bad("bad fullmove number"))?;
        if fullmove_number == 0 {
            return Err(bad("fullmove number starts at 1"));
        }

        let pos = Position {
            grid,
            side_to_move,
            castling,
            en_passant,
            halfmove_clock,
            fullmove_number,
        };

        for color in [Color::White, Color::Black] {
            let kings = pos
                .pieces()
                .filter(|(_, p)| p.color == color && p.kind == PieceType::King)
                .count();
            if kings != 1 {
                return Err(bad("each side needs exactly one king"));
            }
        }
        Ok(pos)
    }

    /// Serialize to the full 6-field FEN form.
    pub fn to_fen(&self) -> String {
        let mut board = String::new();
        for rank in 0..8usize {
            if rank > 0 {
                board.push('/');
            }
            let mut empties = 0;
            for file in 0..8usize {
                match self.grid[rank][file] {
                    Some(piece) => {
                        if empties > 0 {
                            board.push(char::from_digit(empties, 10).unwrap_or('0'));
                            empties = 0;
                        }
                        board.push(piece.to_char());
                    }
                    None => empties += 1,
                }
            }
            if empties > 0 {
                board.push(char::from_digit(empties, 10).unwrap_or('0'));
            }
        }

        let side = match self.side_to_move {
            Color::White => 'w',
            Color::Black => 'b',
        };
        let ep = self
            .en_passant
            .map(|sq| sq.to_algebraic())
            .unwrap_or_else(|| "-".to_string());

        format!(
            "{board} {side} {} {ep} {} {}",
            self.castling.to_fen(),
            self.halfmove_clock,
            self.fullmove_number
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
