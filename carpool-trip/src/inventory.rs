use crate::trip::Trip;

/// Seat counter rules. Callers must hold the trip row lock while using these.
impl Trip {
    /// Seats held by active bookings
    pub fn occupied_seats(&self) -> i32 {
        self.max_seats - self.available_seats
    }

    /// Take one seat (booking confirmed)
    pub fn take_seat(&mut self) -> Result<(), SeatError> {
        if self.available_seats <= 0 {
            return Err(SeatError::Exhausted {
                max: self.max_seats,
            });
        }

        self.available_seats -= 1;
        self.updated_at = chrono::Utc::now();
        Ok(())
    }

    /// Give one seat back (booking cancelled)
    pub fn return_seat(&mut self) -> Result<(), SeatError> {
        if self.available_seats >= self.max_seats {
            return Err(SeatError::AtCapacity {
                max: self.max_seats,
            });
        }

        self.available_seats += 1;
        self.updated_at = chrono::Utc::now();
        Ok(())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SeatError {
    #[error("All {max} seats are taken")]
    Exhausted { max: i32 },

    #[error("Seat counter already at capacity ({max})")]
    AtCapacity { max: i32 },
}
